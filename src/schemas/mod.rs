//! Wire and domain schemas for the telemetry pipeline.
//!
//! `events` carries the browser-facing event shapes validated by the
//! gateway and persisted raw by the persister. `aggregates` carries the
//! bucketed rollups the aggregator writes and the aggregate RPC serves.

pub mod events;
pub mod aggregates;

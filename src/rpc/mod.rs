//! Generated RPC stubs (via `tonic-build` in `build.rs`) plus the thin
//! server/client wrappers around them.

pub mod raw_events_server;
pub mod raw_events_client;
pub mod aggregation_server;

pub mod raw {
    tonic::include_proto!("webtel.raw");
}

pub mod aggregation {
    tonic::include_proto!("webtel.aggregation");
}

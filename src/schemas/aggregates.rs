//! Bucketed aggregate rows written by the aggregator and served by its
//! read API. One struct per event kind, matching the upsert targets in
//! `crate::db::agg` column for column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Natural key shared by every aggregate kind: a time bucket plus whatever
/// dimensions the kind groups by. `extra` holds the kind-specific third
/// dimension (element_id / error_type / event_name) when one exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub time_bucket: DateTime<Utc>,
    pub project_id: String,
    pub page: String,
    pub extra: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageViewsAgg {
    pub time_bucket: DateTime<Utc>,
    pub project_id: String,
    pub page: String,
    pub views_count: i64,
    pub unique_users: i64,
    pub unique_sessions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClicksAgg {
    pub time_bucket: DateTime<Utc>,
    pub project_id: String,
    pub page: String,
    pub element_id: String,
    pub clicks_count: i64,
    pub unique_users: i64,
    pub unique_sessions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceAgg {
    pub time_bucket: DateTime<Utc>,
    pub project_id: String,
    pub page: String,
    pub samples_count: i64,
    pub avg_total_load_ms: f64,
    pub p95_total_load_ms: f64,
    pub avg_ttfb_ms: f64,
    pub p95_ttfb_ms: f64,
    pub avg_fcp_ms: f64,
    pub p95_fcp_ms: f64,
    pub avg_lcp_ms: f64,
    pub p95_lcp_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorsAgg {
    pub time_bucket: DateTime<Utc>,
    pub project_id: String,
    pub page: String,
    pub error_type: String,
    pub errors_count: i64,
    pub warning_count: i64,
    pub critical_count: i64,
    pub unique_users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomEventsAgg {
    pub time_bucket: DateTime<Utc>,
    pub project_id: String,
    pub event_name: String,
    pub page: String,
    pub events_count: i64,
    pub unique_users: i64,
    pub unique_sessions: i64,
}

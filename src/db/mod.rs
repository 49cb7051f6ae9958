//! Postgres-backed stores. One pool per service, matching the teacher's
//! `Database { pool: PgPool }` wrapper in `database/mod.rs`, generalized to
//! the three schemas this system owns: raw events (persister), aggregates
//! plus watermark (aggregator), and health-probe samples (monitor).

pub mod raw;
pub mod agg;
pub mod monitor_db;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Builds a pooled connection exactly as the teacher's `Database::new`
/// does, with the same conservative defaults.
pub async fn connect_pool(connection_string: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(connection_string)
        .await
}

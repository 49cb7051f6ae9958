//! Health monitor (I): probes D, E/F, and G/H on two intervals and serves
//! the uptime rollups the gateway proxies for dashboards.

pub mod http;
pub mod probe;

use crate::config::MonitorConfig;
use crate::db::monitor_db::MonitorStore;
use std::sync::Arc;

pub fn build_scheduler(store: Arc<MonitorStore>, config: &MonitorConfig) -> probe::ProbeScheduler {
    probe::ProbeScheduler::new(store, config.targets.clone(), config.ping_interval, config.ready_interval, config.probe_timeout)
}

pub fn build_router(store: Arc<MonitorStore>) -> axum::Router {
    http::router(Arc::new(http::MonitorHttpState { store }))
}

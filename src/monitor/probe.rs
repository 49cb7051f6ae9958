//! Liveness/readiness probe scheduler (I). Grounded in
//! `monitoring-service/src/monitor.cpp`'s dual-interval loop: ping targets
//! frequently, readiness less often, each sample landing in `logs`. The
//! readiness check mirrors that file's `ready.db_connected` branch -- a
//! `200` response isn't enough on its own, the body's `database_connected`
//! flag decides whether the target actually counts as up.

use crate::config::ProbeTarget;
use crate::db::monitor_db::MonitorStore;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ReadyBody {
    #[serde(default)]
    database_connected: bool,
}

pub struct ProbeScheduler {
    store: Arc<MonitorStore>,
    client: reqwest::Client,
    targets: Vec<ProbeTarget>,
    ping_interval: Duration,
    ready_interval: Duration,
    probe_timeout: Duration,
}

impl ProbeScheduler {
    pub fn new(store: Arc<MonitorStore>, targets: Vec<ProbeTarget>, ping_interval: Duration, ready_interval: Duration, probe_timeout: Duration) -> Self {
        Self { store, client: reqwest::Client::new(), targets, ping_interval, ready_interval, probe_timeout }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        let mut next_ping = vec![Instant::now(); self.targets.len()];
        let mut next_ready = vec![Instant::now(); self.targets.len()];

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("probe scheduler shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let now = Instant::now();
                    for (i, target) in self.targets.iter().enumerate() {
                        if now >= next_ping[i] {
                            self.probe_ping(target).await;
                            next_ping[i] = now + self.ping_interval;
                        }
                        if now >= next_ready[i] {
                            self.probe_ready(target).await;
                            next_ready[i] = now + self.ready_interval;
                        }
                    }
                }
            }
        }
    }

    /// Liveness: reachability and a 2xx status is all that counts.
    async fn probe_ping(&self, target: &ProbeTarget) {
        let url = format!("{}/health/ping", target.base_url);
        let ok = match tokio::time::timeout(self.probe_timeout, self.client.get(&url).send()).await {
            Ok(Ok(resp)) if resp.status().is_success() => {
                info!(target = target.name, "is alive");
                true
            }
            Ok(Ok(resp)) => {
                warn!(target = target.name, status = %resp.status(), "liveness failed");
                false
            }
            Ok(Err(e)) => {
                warn!(target = target.name, error = %e, "unreachable (liveness failed)");
                false
            }
            Err(_) => {
                warn!(target = target.name, "liveness probe timed out");
                false
            }
        };
        self.record(target, ok).await;
    }

    /// Readiness: a 200 isn't enough -- the body's `database_connected` flag
    /// decides whether the dependency is actually up.
    async fn probe_ready(&self, target: &ProbeTarget) {
        let url = format!("{}/health/ready", target.base_url);
        let ok = match tokio::time::timeout(self.probe_timeout, self.client.get(&url).send()).await {
            Ok(Ok(resp)) if resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE => {
                warn!(target = target.name, "not ready");
                false
            }
            Ok(Ok(resp)) if resp.status().is_success() => match resp.json::<ReadyBody>().await {
                Ok(body) if body.database_connected => {
                    info!(target = target.name, "fully operational");
                    true
                }
                Ok(_) => {
                    warn!(target = target.name, "dependency failure (database disconnected)");
                    false
                }
                Err(e) => {
                    warn!(target = target.name, error = %e, "readiness body unparseable");
                    false
                }
            },
            Ok(Ok(resp)) => {
                warn!(target = target.name, status = %resp.status(), "readiness unexpected status");
                false
            }
            Ok(Err(e)) => {
                warn!(target = target.name, error = %e, "readiness check failed");
                false
            }
            Err(_) => {
                warn!(target = target.name, "readiness probe timed out");
                false
            }
        };
        self.record(target, ok).await;
    }

    async fn record(&self, target: &ProbeTarget, ok: bool) {
        if let Err(e) = self.store.record(target.name, ok, Utc::now()).await {
            warn!(target = target.name, error = %e, "failed to record probe sample");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_get_independent_next_ping_slots() {
        let targets = vec![
            ProbeTarget { name: "a", base_url: "http://a".into() },
            ProbeTarget { name: "b", base_url: "http://b".into() },
        ];
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn ready_body_flags_disconnected_dependency() {
        let body: ReadyBody = serde_json::from_str(r#"{"status":"ready","database_connected":false,"service":"x"}"#).unwrap();
        assert!(!body.database_connected);
    }

    #[test]
    fn ready_body_missing_field_defaults_to_disconnected() {
        let body: ReadyBody = serde_json::from_str(r#"{"status":"ready"}"#).unwrap();
        assert!(!body.database_connected);
    }
}

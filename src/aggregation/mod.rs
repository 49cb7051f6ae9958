//! The aggregator's tick loop (G): watermark-driven incremental
//! recomputation over fixed time buckets. Grounded in `aggregator.cpp`'s
//! `run()` sequence (read watermark, fetch since watermark, bucket +
//! aggregate, upsert, advance watermark only on success).

pub mod bucket;
pub mod stats;

use crate::db::agg::AggStore;
use crate::rpc::raw_events_client::RawEventsClient;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Aggregator {
    store: Arc<AggStore>,
    client: RawEventsClient,
    bucket_minutes: i64,
    interval: Duration,
}

impl Aggregator {
    pub fn new(store: Arc<AggStore>, client: RawEventsClient, bucket_minutes: i64, interval: Duration) -> Self {
        Self { store, client, bucket_minutes, interval }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("aggregator shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "aggregation tick failed, watermark not advanced");
                    }
                }
            }
        }
    }

    /// One tick: half-open `[watermark, now)` fetch window, the fix that
    /// prevents an event from being double-counted across ticks (see
    /// spec's edge-case note on bucket-straddling).
    async fn tick(&mut self) -> anyhow::Result<()> {
        let watermark = self.store.get_watermark().await?;
        let now = Utc::now();

        let fetched = self.client.fetch_all(watermark, now).await?;

        let page_views = bucket::aggregate_page_views(&fetched.page_views, self.bucket_minutes);
        let clicks = bucket::aggregate_clicks(&fetched.clicks, self.bucket_minutes);
        let performance = bucket::aggregate_performance(&fetched.performance, self.bucket_minutes);
        let errors = bucket::aggregate_errors(&fetched.errors, self.bucket_minutes);
        let custom_events = bucket::aggregate_custom_events(&fetched.custom_events, self.bucket_minutes);

        self.store.upsert_page_views(&page_views).await?;
        self.store.upsert_clicks(&clicks).await?;
        self.store.upsert_performance(&performance).await?;
        self.store.upsert_errors(&errors).await?;
        self.store.upsert_custom_events(&custom_events).await?;

        self.store.set_watermark(now).await?;
        info!(
            page_views = page_views.len(),
            clicks = clicks.len(),
            performance = performance.len(),
            errors = errors.len(),
            custom_events = custom_events.len(),
            "aggregation tick complete"
        );
        Ok(())
    }
}

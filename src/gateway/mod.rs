//! Ingestion gateway (D): validates and publishes events, and proxies
//! aggregate/uptime reads to H and I.

pub mod handlers;
pub mod proxy;

use crate::broker::publisher::Publisher;
use crate::config::GatewayConfig;
use crate::health;
use crate::rpc::aggregation::aggregation_service_client::AggregationServiceClient;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tonic::transport::Channel;
use tower_http::trace::TraceLayer;

pub struct GatewayState {
    pub publisher: Publisher,
    pub agg_client: AggregationServiceClient<Channel>,
    pub http_client: reqwest::Client,
    pub config: GatewayConfig,
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/page-views", post(handlers::post_page_view))
        .route("/clicks", post(handlers::post_click))
        .route("/performance", post(handlers::post_performance))
        .route("/errors", post(handlers::post_error))
        .route("/custom-events", post(handlers::post_custom_event))
        .route("/aggregation/watermark", get(proxy::get_watermark))
        .route("/aggregation/page-views", post(proxy::post_page_views_agg))
        .route("/aggregation/clicks", post(proxy::post_clicks_agg))
        .route("/aggregation/performance", post(proxy::post_performance_agg))
        .route("/aggregation/errors", post(proxy::post_errors_agg))
        .route("/aggregation/custom-events", post(proxy::post_custom_events_agg))
        .route("/uptime", get(proxy::get_uptime))
        .route("/uptime/day", get(proxy::get_uptime_day))
        .route("/uptime/week", get(proxy::get_uptime_week))
        .route("/uptime/month", get(proxy::get_uptime_month))
        .route("/uptime/year", get(proxy::get_uptime_year))
        .merge(health::router("api-service", Arc::new(health::AlwaysReady)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Shared health router for D, E, and G. Grounded in
//! `aggregation-service/src/handlers.cpp`'s `/health/ping` and `/health`
//! handlers, plus `monitoring-service/src/http_server.cpp`'s
//! `/health/ready` readiness contract. `/health` and `/ping` are
//! convenience aliases carried over from the source, not part of the
//! monitor's probe contract (which only hits `/health/ping` and
//! `/health/ready`).

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self) -> bool;
}

pub struct AlwaysReady;

#[async_trait]
impl ReadinessProbe for AlwaysReady {
    async fn is_ready(&self) -> bool {
        true
    }
}

#[derive(Clone)]
struct HealthState {
    service_name: &'static str,
    probe: Arc<dyn ReadinessProbe>,
}

pub fn router(service_name: &'static str, probe: Arc<dyn ReadinessProbe>) -> Router {
    let state = HealthState { service_name, probe };
    Router::new()
        .route("/health/ping", get(ping_json))
        .route("/health/ready", get(ready))
        .route("/health", get(health))
        .route("/ping", get(ping_text))
        .with_state(state)
}

async fn ping_json(State(state): State<HealthState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn ping_text() -> &'static str {
    "pong"
}

async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn ready(State(state): State<HealthState>) -> impl IntoResponse {
    let ready = state.probe.is_ready().await;
    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "database_connected": ready,
        "service": state.service_name,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if ready {
        (StatusCode::OK, Json(body))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

//! HTTP surface for the monitor (I): `/uptime[?service&period]` and the
//! `/uptime/{day,week,month,year}` shortcuts. Grounded in
//! `monitoring-service/src/http_server.cpp`'s uptime contract: a missing
//! `service` query param is a 400, an unknown `period` name is a 400, and a
//! specific period narrows the response down to that one key.

use crate::db::monitor_db::{MonitorStore, UptimeStats};
use crate::errors::ErrorBody;
use crate::health;
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct MonitorHttpState {
    pub store: Arc<MonitorStore>,
}

struct DbReady(Arc<MonitorStore>);

#[async_trait]
impl health::ReadinessProbe for DbReady {
    async fn is_ready(&self) -> bool {
        self.0.ping().await.is_ok()
    }
}

pub fn router(state: Arc<MonitorHttpState>) -> Router {
    Router::new()
        .route("/uptime", get(get_uptime))
        .route("/uptime/day", get(get_uptime_day))
        .route("/uptime/week", get(get_uptime_week))
        .route("/uptime/month", get(get_uptime_month))
        .route("/uptime/year", get(get_uptime_year))
        .with_state(state.clone())
        .merge(health::router("monitoring-service", Arc::new(DbReady(state.store.clone()))))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct UptimeQuery {
    service: Option<String>,
    period: Option<String>,
}

fn stats_to_json(stats: &UptimeStats) -> serde_json::Value {
    json!({
        "day": { "ok": stats.day.ok, "total": stats.day.total, "percent": stats.day.percent() },
        "week": { "ok": stats.week.ok, "total": stats.week.total, "percent": stats.week.percent() },
        "month": { "ok": stats.month.ok, "total": stats.month.total, "percent": stats.month.percent() },
        "year": { "ok": stats.year.ok, "total": stats.year.total, "percent": stats.year.percent() },
    })
}

fn narrow(stats: &UptimeStats, period: &str) -> Result<serde_json::Value, (StatusCode, Json<ErrorBody>)> {
    let p = match period {
        "day" => stats.day,
        "week" => stats.week,
        "month" => stats.month,
        "year" => stats.year,
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::bad_request("VALIDATION_ERROR", format!("unknown period: {other}"))),
            ))
        }
    };
    Ok(json!({ "ok": p.ok, "total": p.total, "percent": p.percent() }))
}

async fn fetch(state: &MonitorHttpState, service: Option<String>) -> Result<(String, UptimeStats), (StatusCode, Json<ErrorBody>)> {
    let service = service.ok_or_else(|| (StatusCode::BAD_REQUEST, Json(ErrorBody::bad_request("VALIDATION_ERROR", "missing query param: service"))))?;
    let stats = state
        .store
        .get_uptime_stats(&service, Utc::now())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal(e.to_string()))))?;
    Ok((service, stats))
}

async fn get_uptime(State(state): State<Arc<MonitorHttpState>>, Query(q): Query<UptimeQuery>) -> impl IntoResponse {
    let (service, stats) = match fetch(&state, q.service).await {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    match q.period {
        Some(period) => match narrow(&stats, &period) {
            Ok(body) => Json(json!({ "service": service, "period": period, "uptime": body })).into_response(),
            Err(e) => e.into_response(),
        },
        None => Json(json!({ "service": service, "uptime": stats_to_json(&stats) })).into_response(),
    }
}

async fn get_uptime_day(State(state): State<Arc<MonitorHttpState>>, Query(q): Query<UptimeQuery>) -> impl IntoResponse {
    one_period(&state, q.service, "day").await
}

async fn get_uptime_week(State(state): State<Arc<MonitorHttpState>>, Query(q): Query<UptimeQuery>) -> impl IntoResponse {
    one_period(&state, q.service, "week").await
}

async fn get_uptime_month(State(state): State<Arc<MonitorHttpState>>, Query(q): Query<UptimeQuery>) -> impl IntoResponse {
    one_period(&state, q.service, "month").await
}

async fn get_uptime_year(State(state): State<Arc<MonitorHttpState>>, Query(q): Query<UptimeQuery>) -> impl IntoResponse {
    one_period(&state, q.service, "year").await
}

async fn one_period(state: &MonitorHttpState, service: Option<String>, period: &str) -> axum::response::Response {
    let (service, stats) = match fetch(state, service).await {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    match narrow(&stats, period) {
        Ok(body) => Json(json!({ "service": service, "period": period, "uptime": body })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::monitor_db::UptimePeriod;

    #[test]
    fn narrow_rejects_unknown_period() {
        let stats = UptimeStats::default();
        assert!(narrow(&stats, "decade").is_err());
    }

    #[test]
    fn narrow_picks_requested_period() {
        let mut stats = UptimeStats::default();
        stats.week = UptimePeriod { ok: 5, total: 10 };
        let body = narrow(&stats, "week").unwrap();
        assert_eq!(body["percent"], 50.0);
    }
}

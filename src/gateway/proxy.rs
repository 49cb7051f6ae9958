//! Read-only proxy surface: aggregate queries forwarded to H over gRPC,
//! uptime queries forwarded to I over HTTP. Dependency timeouts are
//! configurable per spec.md §4.D; a timeout or dependency failure becomes
//! 502/500 with `INTERNAL_ERROR`.

use super::GatewayState;
use crate::errors::ErrorBody;
use crate::rpc::aggregation::{
    GetClicksAggRequest, GetCustomEventsAggRequest, GetErrorsAggRequest, GetPageViewsAggRequest, GetPerformanceAggRequest, GetWatermarkRequest,
    Pagination as RpcPagination, TimeRange as RpcTimeRange,
};
use crate::time::{datetime_to_prost_timestamp, prost_timestamp_to_datetime};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn bad_gateway(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_GATEWAY, Json(ErrorBody::bad_request("INTERNAL_ERROR", message)))
}

fn internal(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal(message)))
}

fn bucket_iso(ts: Option<prost_types::Timestamp>) -> Option<String> {
    ts.and_then(|t| prost_timestamp_to_datetime(&t)).map(|d| d.to_rfc3339())
}

pub async fn get_watermark(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let mut client = state.agg_client.clone();
    let call = client.get_watermark(GetWatermarkRequest {});
    match tokio::time::timeout(state.config.aggregation_grpc_timeout, call).await {
        Ok(Ok(resp)) => {
            let ts = resp.into_inner().last_aggregated_at;
            let iso = ts.and_then(|t| crate::time::prost_timestamp_to_datetime(&t)).map(|d| d.to_rfc3339());
            Json(json!({ "last_aggregated_at": iso })).into_response()
        }
        Ok(Err(status)) => bad_gateway(status.message().to_string()).into_response(),
        Err(_) => bad_gateway("aggregation service timed out").into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AggQueryBody {
    pub project_id: String,
    pub from_ms: i64,
    pub to_ms: i64,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub limit: Option<i32>,
    #[serde(default)]
    pub offset: Option<i32>,
}

impl AggQueryBody {
    fn range(&self) -> RpcTimeRange {
        let from: DateTime<Utc> = crate::time::millis_to_datetime(self.from_ms).unwrap_or_else(Utc::now);
        let to: DateTime<Utc> = crate::time::millis_to_datetime(self.to_ms).unwrap_or_else(Utc::now);
        RpcTimeRange { from: Some(datetime_to_prost_timestamp(from)), to: Some(datetime_to_prost_timestamp(to)) }
    }

    fn pagination(&self) -> Option<RpcPagination> {
        if self.limit.is_none() && self.offset.is_none() {
            None
        } else {
            Some(RpcPagination { limit: self.limit.unwrap_or(0), offset: self.offset.unwrap_or(0) })
        }
    }
}

pub async fn post_page_views_agg(State(state): State<Arc<GatewayState>>, Json(body): Json<AggQueryBody>) -> impl IntoResponse {
    let mut client = state.agg_client.clone();
    let req = GetPageViewsAggRequest { project_id: body.project_id.clone(), time_range: Some(body.range()), page: body.page.clone(), pagination: body.pagination() };
    match tokio::time::timeout(state.config.aggregation_grpc_timeout, client.get_page_views_agg(req)).await {
        Ok(Ok(resp)) => Json(
            resp.into_inner()
                .rows
                .into_iter()
                .map(|r| {
                    json!({
                        "time_bucket": bucket_iso(r.time_bucket),
                        "project_id": r.project_id,
                        "page": r.page,
                        "views_count": r.views_count,
                        "unique_users": r.unique_users,
                        "unique_sessions": r.unique_sessions,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Ok(Err(status)) => bad_gateway(status.message().to_string()).into_response(),
        Err(_) => bad_gateway("aggregation service timed out").into_response(),
    }
}

pub async fn post_clicks_agg(State(state): State<Arc<GatewayState>>, Json(body): Json<AggQueryBody>) -> impl IntoResponse {
    let mut client = state.agg_client.clone();
    let req = GetClicksAggRequest {
        project_id: body.project_id.clone(),
        time_range: Some(body.range()),
        page: body.page.clone(),
        element_id: body.element_id.clone(),
        pagination: body.pagination(),
    };
    match tokio::time::timeout(state.config.aggregation_grpc_timeout, client.get_clicks_agg(req)).await {
        Ok(Ok(resp)) => Json(
            resp.into_inner()
                .rows
                .into_iter()
                .map(|r| {
                    json!({
                        "time_bucket": bucket_iso(r.time_bucket),
                        "project_id": r.project_id,
                        "page": r.page,
                        "element_id": r.element_id,
                        "clicks_count": r.clicks_count,
                        "unique_users": r.unique_users,
                        "unique_sessions": r.unique_sessions,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Ok(Err(status)) => bad_gateway(status.message().to_string()).into_response(),
        Err(_) => bad_gateway("aggregation service timed out").into_response(),
    }
}

pub async fn post_performance_agg(State(state): State<Arc<GatewayState>>, Json(body): Json<AggQueryBody>) -> impl IntoResponse {
    let mut client = state.agg_client.clone();
    let req = GetPerformanceAggRequest { project_id: body.project_id.clone(), time_range: Some(body.range()), page: body.page.clone(), pagination: body.pagination() };
    match tokio::time::timeout(state.config.aggregation_grpc_timeout, client.get_performance_agg(req)).await {
        Ok(Ok(resp)) => Json(
            resp.into_inner()
                .rows
                .into_iter()
                .map(|r| {
                    json!({
                        "time_bucket": bucket_iso(r.time_bucket),
                        "project_id": r.project_id,
                        "page": r.page,
                        "samples_count": r.samples_count,
                        "avg_total_load_ms": r.avg_total_load_ms,
                        "p95_total_load_ms": r.p95_total_load_ms,
                        "avg_ttfb_ms": r.avg_ttfb_ms,
                        "p95_ttfb_ms": r.p95_ttfb_ms,
                        "avg_fcp_ms": r.avg_fcp_ms,
                        "p95_fcp_ms": r.p95_fcp_ms,
                        "avg_lcp_ms": r.avg_lcp_ms,
                        "p95_lcp_ms": r.p95_lcp_ms,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Ok(Err(status)) => bad_gateway(status.message().to_string()).into_response(),
        Err(_) => bad_gateway("aggregation service timed out").into_response(),
    }
}

pub async fn post_errors_agg(State(state): State<Arc<GatewayState>>, Json(body): Json<AggQueryBody>) -> impl IntoResponse {
    let mut client = state.agg_client.clone();
    let req = GetErrorsAggRequest {
        project_id: body.project_id.clone(),
        time_range: Some(body.range()),
        page: body.page.clone(),
        error_type: body.error_type.clone(),
        pagination: body.pagination(),
    };
    match tokio::time::timeout(state.config.aggregation_grpc_timeout, client.get_errors_agg(req)).await {
        Ok(Ok(resp)) => Json(
            resp.into_inner()
                .rows
                .into_iter()
                .map(|r| {
                    json!({
                        "time_bucket": bucket_iso(r.time_bucket),
                        "project_id": r.project_id,
                        "page": r.page,
                        "error_type": r.error_type,
                        "errors_count": r.errors_count,
                        "warning_count": r.warning_count,
                        "critical_count": r.critical_count,
                        "unique_users": r.unique_users,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Ok(Err(status)) => bad_gateway(status.message().to_string()).into_response(),
        Err(_) => bad_gateway("aggregation service timed out").into_response(),
    }
}

pub async fn post_custom_events_agg(State(state): State<Arc<GatewayState>>, Json(body): Json<AggQueryBody>) -> impl IntoResponse {
    if body.event_name.is_none() {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::bad_request("VALIDATION_ERROR", "event_name is required"))).into_response();
    }
    let mut client = state.agg_client.clone();
    let req = GetCustomEventsAggRequest {
        project_id: body.project_id.clone(),
        event_name: body.event_name.clone().unwrap_or_default(),
        time_range: Some(body.range()),
        page: body.page.clone(),
        pagination: body.pagination(),
    };
    match tokio::time::timeout(state.config.aggregation_grpc_timeout, client.get_custom_events_agg(req)).await {
        Ok(Ok(resp)) => Json(
            resp.into_inner()
                .rows
                .into_iter()
                .map(|r| {
                    json!({
                        "time_bucket": bucket_iso(r.time_bucket),
                        "project_id": r.project_id,
                        "event_name": r.event_name,
                        "page": r.page,
                        "events_count": r.events_count,
                        "unique_users": r.unique_users,
                        "unique_sessions": r.unique_sessions,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Ok(Err(status)) => bad_gateway(status.message().to_string()).into_response(),
        Err(_) => bad_gateway("aggregation service timed out").into_response(),
    }
}

async fn proxy_uptime(state: &GatewayState, path: &str, params: &HashMap<String, String>) -> impl IntoResponse {
    let url = format!("{}{}", state.config.monitoring_base_url(), path);
    let call = state.http_client.get(&url).query(params).send();
    match tokio::time::timeout(state.config.monitoring_http_timeout, call).await {
        Ok(Ok(resp)) => {
            let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            match resp.json::<serde_json::Value>().await {
                Ok(body) => (status, Json(body)).into_response(),
                Err(e) => internal(e.to_string()).into_response(),
            }
        }
        Ok(Err(e)) => bad_gateway(e.to_string()).into_response(),
        Err(_) => bad_gateway("monitoring service timed out").into_response(),
    }
}

pub async fn get_uptime(State(state): State<Arc<GatewayState>>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    proxy_uptime(&state, "/uptime", &params).await.into_response()
}

pub async fn get_uptime_day(State(state): State<Arc<GatewayState>>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    proxy_uptime(&state, "/uptime/day", &params).await.into_response()
}

pub async fn get_uptime_week(State(state): State<Arc<GatewayState>>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    proxy_uptime(&state, "/uptime/week", &params).await.into_response()
}

pub async fn get_uptime_month(State(state): State<Arc<GatewayState>>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    proxy_uptime(&state, "/uptime/month", &params).await.into_response()
}

pub async fn get_uptime_year(State(state): State<Arc<GatewayState>>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    proxy_uptime(&state, "/uptime/year", &params).await.into_response()
}

//! One handler per event kind. Malformed JSON and failed validation both
//! return 400 with the matching `INVALID_*` code; publish failures return
//! 500, and a saturated internal queue returns 503 -- all per spec.md §4.D.

use super::GatewayState;
use crate::broker::{QUEUE_CLICKS, QUEUE_CUSTOM_EVENTS, QUEUE_ERRORS, QUEUE_PAGE_VIEWS, QUEUE_PERFORMANCE};
use crate::errors::{BrokerError, ErrorBody};
use crate::schemas::events::{ClickEvent, CustomEvent, ErrorEvent, PageViewEvent, PerformanceEvent};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

fn malformed(code: &'static str, err: serde_json::Error) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::bad_request(code, format!("malformed request body: {err}"))))
}

fn publish_error(err: BrokerError) -> (StatusCode, Json<ErrorBody>) {
    match err {
        BrokerError::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody::bad_request("INTERNAL_ERROR", "internal publish queue is full"))),
        other => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal(other.to_string()))),
    }
}

macro_rules! event_handler {
    ($name:ident, $event_ty:ty, $invalid_code:literal, $queue:expr) => {
        pub async fn $name(State(state): State<Arc<GatewayState>>, body: Bytes) -> impl IntoResponse {
            let event: $event_ty = match serde_json::from_slice(&body) {
                Ok(e) => e,
                Err(e) => return malformed($invalid_code, e).into_response(),
            };
            if let Err(ve) = event.validate() {
                return (StatusCode::BAD_REQUEST, Json(ErrorBody::from_validation(&ve))).into_response();
            }
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal(e.to_string()))).into_response(),
            };
            match state.publisher.try_publish($queue, payload) {
                Ok(()) => StatusCode::ACCEPTED.into_response(),
                Err(e) => publish_error(e).into_response(),
            }
        }
    };
}

event_handler!(post_page_view, PageViewEvent, "INVALID_PAGE_VIEW", QUEUE_PAGE_VIEWS);
event_handler!(post_click, ClickEvent, "INVALID_CLICK_EVENT", QUEUE_CLICKS);
event_handler!(post_performance, PerformanceEvent, "INVALID_PERFORMANCE_EVENT", QUEUE_PERFORMANCE);
event_handler!(post_error, ErrorEvent, "INVALID_ERROR_EVENT", QUEUE_ERRORS);
event_handler!(post_custom_event, CustomEvent, "INVALID_CUSTOM_EVENT", QUEUE_CUSTOM_EVENTS);

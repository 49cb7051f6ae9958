//! Shared error types. Service-specific HTTP/RPC mapping lives alongside
//! each handler module; this file holds the enums they wrap.

use crate::schemas::events::ValidationError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("broker error: {0}")]
    Broker(#[from] anyhow::Error),
}

/// Body shape for every 4xx/5xx the gateway and monitor return.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn from_validation(err: &ValidationError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            details: Some(serde_json::json!({ "field": err.field, "reason": err.reason })),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { code: "INTERNAL_ERROR", message: message.into(), details: None }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { code: "NOT_FOUND", message: message.into(), details: None }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("publish channel closed")]
    ChannelClosed,
    #[error("publish queue full, dropping event")]
    QueueFull,
}

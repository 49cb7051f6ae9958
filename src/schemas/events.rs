//! Raw event shapes accepted by the gateway and stored by the persister.
//!
//! Each kind mirrors a JSON body posted to `/events/<kind>`. Validation is
//! deliberately permissive about optional context (user/session ids) and
//! strict about the fields each aggregate key is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity as carried on error events. `1..=3`, matching the wire contract;
/// string aliases (`"warning"`, `"error"`, `"critical"`, case-insensitive)
/// are accepted on ingestion and normalized to this enum before storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum Severity {
    Warning = 1,
    Error = 2,
    Critical = 3,
}

impl Severity {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Severity::Warning),
            2 => Some(Severity::Error),
            3 => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn from_alias(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Error
    }
}

/// A single validation failure, shaped to serialize directly into the
/// gateway's 400 response body: `{"code","message","details":{"field","reason"}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    fn new(code: &'static str, field: &'static str, reason: &'static str, message: impl Into<String>) -> Self {
        Self { code, field, reason, message: message.into() }
    }

    fn required(code: &'static str, field: &'static str) -> Self {
        Self::new(code, field, "required", format!("field '{field}' is required and must not be empty"))
    }

    fn invalid(code: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, field, "invalid", message)
    }
}

fn require_non_empty<'a>(code: &'static str, field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::required(code, field))
    } else {
        Ok(value)
    }
}

fn require_timestamp(code: &'static str, timestamp_ms: i64) -> Result<(), ValidationError> {
    if timestamp_ms <= 0 {
        return Err(ValidationError::invalid(code, "timestamp", "timestamp must be a positive epoch millisecond value"));
    }
    Ok(())
}

/// `project_id` is optional on ingestion; events without one are filed under
/// this catch-all project rather than rejected.
fn default_project_id() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageViewEvent {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    pub page: String,
    pub timestamp: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

impl PageViewEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("INVALID_PAGE_VIEW", "page", &self.page)?;
        require_timestamp("INVALID_PAGE_VIEW", self.timestamp)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    pub page: String,
    pub element_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ClickEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("INVALID_CLICK_EVENT", "page", &self.page)?;
        require_non_empty("INVALID_CLICK_EVENT", "element_id", &self.element_id)?;
        require_timestamp("INVALID_CLICK_EVENT", self.timestamp)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceEvent {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    pub page: String,
    pub timestamp: i64,
    #[serde(default)]
    pub ttfb_ms: Option<f64>,
    #[serde(default)]
    pub fcp_ms: Option<f64>,
    #[serde(default)]
    pub lcp_ms: Option<f64>,
    #[serde(default)]
    pub total_page_load_ms: Option<f64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl PerformanceEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("INVALID_PERFORMANCE_EVENT", "page", &self.page)?;
        require_timestamp("INVALID_PERFORMANCE_EVENT", self.timestamp)?;
        for (field, value) in [
            ("ttfb_ms", self.ttfb_ms),
            ("fcp_ms", self.fcp_ms),
            ("lcp_ms", self.lcp_ms),
            ("total_page_load_ms", self.total_page_load_ms),
        ] {
            if let Some(v) = value {
                if v < 0.0 || !v.is_finite() {
                    return Err(ValidationError::invalid(
                        "INVALID_PERFORMANCE_EVENT",
                        field,
                        format!("field '{field}' must be a non-negative finite number"),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeverityInput {
    Code(i32),
    Name(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    pub page: String,
    pub error_type: String,
    pub message: String,
    pub timestamp: i64,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub severity: Option<SeverityInput>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ErrorEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("INVALID_ERROR_EVENT", "page", &self.page)?;
        require_non_empty("INVALID_ERROR_EVENT", "error_type", &self.error_type)?;
        require_non_empty("INVALID_ERROR_EVENT", "message", &self.message)?;
        require_timestamp("INVALID_ERROR_EVENT", self.timestamp)?;
        self.severity_or_default()?;
        Ok(())
    }

    pub fn severity_or_default(&self) -> Result<Severity, ValidationError> {
        match &self.severity {
            None => Ok(Severity::default()),
            Some(SeverityInput::Code(c)) => Severity::from_i32(*c)
                .ok_or_else(|| ValidationError::invalid("INVALID_ERROR_EVENT", "severity", "severity must be 1 (warning), 2 (error) or 3 (critical)")),
            Some(SeverityInput::Name(s)) => Severity::from_alias(s)
                .ok_or_else(|| ValidationError::invalid("INVALID_ERROR_EVENT", "severity", "severity name must be one of 'warning', 'error', 'critical'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomEvent {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    pub name: String,
    pub timestamp: i64,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl CustomEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("INVALID_CUSTOM_EVENT", "name", &self.name)?;
        require_timestamp("INVALID_CUSTOM_EVENT", self.timestamp)?;
        Ok(())
    }
}

/// Stored row identity: every raw event gets a server-assigned id and an
/// ingestion timestamp distinct from the client-reported `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: T,
}

impl<T> Envelope<T> {
    pub fn new(event: T) -> Self {
        Self { id: Uuid::new_v4(), received_at: Utc::now(), event }
    }
}

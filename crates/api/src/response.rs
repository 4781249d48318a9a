//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use telemetry::HealthReport;
use worker::{AggregationResult, PurgeResult};

/// Response for an on-demand aggregation.
#[derive(Debug, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub success: bool,
    pub message: String,
    pub entities_updated: u64,
    pub events_scanned: u64,
    pub events_skipped: u64,
    pub entities_failed: Vec<String>,
    pub timestamp: i64,
}

impl From<AggregationResult> for AggregateResponse {
    fn from(result: AggregationResult) -> Self {
        let message = if result.entities_failed.is_empty() {
            format!("Updated stats for {} suppliers", result.entities_updated)
        } else {
            format!(
                "Updated stats for {} suppliers, {} failed",
                result.entities_updated,
                result.entities_failed.len()
            )
        };

        Self {
            success: true,
            message,
            entities_updated: result.entities_updated,
            events_scanned: result.events_scanned,
            events_skipped: result.events_skipped,
            entities_failed: result.entities_failed,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Response for an on-demand purge.
#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub success: bool,
    pub message: String,
    pub deleted: u64,
    pub batches: u64,
    pub timestamp: i64,
}

impl From<PurgeResult> for PurgeResponse {
    fn from(result: PurgeResult) -> Self {
        Self {
            success: true,
            message: format!(
                "Deleted {} clicks older than {}",
                result.deleted,
                result.cutoff.to_rfc3339()
            ),
            deleted: result.deleted,
            batches: result.batches,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub report: HealthReport,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error type carrying the pipeline error codes.
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
    }

    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new("Validation failed", "VALID_001").with_details(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

fn status_of(http_status: u16) -> StatusCode {
    StatusCode::from_u16(http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<stats_core::Error> for ApiError {
    fn from(err: stats_core::Error) -> Self {
        use stats_core::Error;

        match &err {
            Error::Store {
                code,
                message,
                http_status,
            }
            | Error::Timeout {
                code,
                message,
                deleted: None,
                http_status,
            } => ApiError::with_code(status_of(*http_status), *code, message),
            Error::BatchDelete {
                code,
                message,
                deleted,
                http_status,
            }
            | Error::Timeout {
                code,
                message,
                deleted: Some(deleted),
                http_status,
            } => {
                let mut api = ApiError::with_code(status_of(*http_status), *code, message);
                api.response = api
                    .response
                    .with_details(vec![format!("deleted before failure: {deleted}")]);
                api
            }
            Error::Validation(msg) => ApiError::bad_request(msg),
            _ => ApiError::internal(err.to_string()),
        }
    }
}

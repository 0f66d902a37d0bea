//! HTTP API handlers for the queue service

pub mod health;
pub mod requests;

use axum::{http::StatusCode, Json};
use jukeq_common::Error;
use serde::Serialize;
use tracing::error;

pub use health::health_routes;
pub use requests::{
    cancel_request, create_request, list_queue, promote_request, queue_stats, update_status,
};

/// Structured error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code
    pub error: &'static str,
    pub message: String,
    /// Configured quota limit, present on quota errors for client display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Map a core error to an HTTP response
pub fn error_response(e: Error) -> (StatusCode, Json<ErrorBody>) {
    let (status, code, limit) = match &e {
        Error::QuotaExceeded { limit } => {
            (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded", Some(*limit))
        }
        Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
        Error::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "invalid_status", None),
        Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input", None),
        Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition", None),
        Error::Conflict(_) => (StatusCode::SERVICE_UNAVAILABLE, "conflict", None),
        Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
            error!("Unexpected failure: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal", None)
        }
    };

    (
        status,
        Json(ErrorBody {
            error: code,
            message: e.to_string(),
            limit,
        }),
    )
}

//! Error handling utilities for services and route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::ledger::LedgerError;

/// Every failure a service can surface. Each kind maps to its own status
/// code so callers can branch on it; no kind is folded into another.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing input; `field` names the offending parameter
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthenticated,

    /// External identity verification rejected the request
    #[error("Invalid credentials: {0}")]
    AuthFailure(String),

    /// Local mutation succeeded but the external store did not follow;
    /// the ledger has already been rolled back
    #[error("An internal error occurred while updating Firebase: {0}")]
    SyncFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::AuthFailure(_) => StatusCode::BAD_REQUEST,
            ServiceError::SyncFailure(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        tracing::error!(error = %e, "ledger failure");
        ServiceError::Internal(e.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ServiceError::Validation { field, .. } => {
                json!({ "error": self.to_string(), "field": field })
            }
            // Internal details stay in the logs
            ServiceError::Internal(_) => json!({ "error": "Internal server error" }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Extension trait for logging errors and converting to ServiceError
pub trait LogErr<T> {
    /// Log error with context and return an internal error
    fn log_500(self, context: &str) -> Result<T, ServiceError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, ServiceError> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{}", context);
            ServiceError::Internal(context.to_string())
        })
    }
}

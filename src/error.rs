//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::domain::DomainError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Postgres error codes that mean "try again": serialization failure,
/// deadlock, lock not available, statement timeout.
const RETRYABLE_SQLSTATES: &[&str] = &["40001", "40P01", "55P03", "57014"];

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// The domain error inside, if any
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_retryable_db_error(&err) {
            return AppError::Domain(DomainError::TransactionFailed(err.to_string()));
        }
        AppError::Database(err)
    }
}

fn is_retryable_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&&*code)),
        _ => false,
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request", None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", None),

            AppError::Domain(domain_err) => {
                let kind = domain_err.kind();
                match domain_err {
                    DomainError::ProductNotFound(id)
                    | DomainError::CustomerNotFound(id)
                    | DomainError::PromoNotFound(id)
                    | DomainError::PurchaseNotFound(id) => {
                        (StatusCode::NOT_FOUND, kind, Some(json!({ "id": id })))
                    }
                    DomainError::InvalidQuantity(quantity) => (
                        StatusCode::BAD_REQUEST,
                        kind,
                        Some(json!({ "quantity": quantity })),
                    ),
                    DomainError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, kind, None),
                    DomainError::InsufficientStock {
                        requested,
                        available,
                    } => (
                        StatusCode::CONFLICT,
                        kind,
                        Some(json!({ "requested": requested, "available": available })),
                    ),
                    DomainError::AlreadyAssigned {
                        promo_id,
                        customer_id,
                    } => (
                        StatusCode::CONFLICT,
                        kind,
                        Some(json!({ "promo_id": promo_id, "customer_id": customer_id })),
                    ),
                    DomainError::IdempotencyConflict(key) => (
                        StatusCode::CONFLICT,
                        kind,
                        Some(json!({ "idempotency_key": key })),
                    ),
                    DomainError::PromoIneligible(reason) => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        kind,
                        Some(json!({ "reason": reason })),
                    ),
                    DomainError::TransactionFailed(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, kind, None)
                    }
                }
            }

            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, details) = self.parts();

        // Infrastructure faults are logged in full but never echoed to the caller.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "Database error");
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            AppError::Config(e) => {
                tracing::error!(error = ?e, "Config error");
                "Internal server error".to_string()
            }
            AppError::Domain(DomainError::TransactionFailed(reason)) => {
                tracing::warn!(reason = %reason, "Transaction failed, client may retry");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            kind: kind.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

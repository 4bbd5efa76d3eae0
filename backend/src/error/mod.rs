//! Error types for the rewards backend
//!
//! `GiftError` is the domain taxonomy surfaced by the issuance workflow.
//! `ApiError` maps it (and the lower layers) onto HTTP status codes and a
//! stable JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::provider::ProviderError;
use crate::store::StoreError;

/// Failures of the gift issuance and settlement workflow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GiftError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: available {available} cents, requested {requested} cents")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Gift provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Gift provider request failed with status {status}")]
    ProviderRequestFailed { status: u16 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cancellation rejected: {0}")]
    CancellationRejected(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl GiftError {
    pub fn gift_not_found(id: Uuid) -> Self {
        GiftError::NotFound(format!("gift {}", id))
    }
}

impl From<StoreError> for GiftError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => GiftError::NotFound(what),
            StoreError::InsufficientFunds {
                available,
                requested,
            } => GiftError::InsufficientFunds {
                available,
                requested,
            },
            StoreError::Conflict(msg) => GiftError::Conflict(msg),
            StoreError::BalanceOutOfRange(msg) => GiftError::Validation(msg),
            other => GiftError::Storage(other.to_string()),
        }
    }
}

impl From<ProviderError> for GiftError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured => {
                GiftError::Configuration("gift provider API key is not set".to_string())
            }
            ProviderError::RequestFailed { status, .. } => {
                GiftError::ProviderRequestFailed { status }
            }
            ProviderError::Unavailable(msg) | ProviderError::InvalidResponse(msg) => {
                GiftError::ProviderUnavailable(msg)
            }
            ProviderError::NotFound(what) => GiftError::NotFound(what),
        }
    }
}

impl From<validator::ValidationErrors> for GiftError {
    fn from(err: validator::ValidationErrors) -> Self {
        GiftError::Validation(err.to_string())
    }
}

/// Errors returned by handlers, each with a fixed status and error code
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// `{"error": {"code": ..., "message": ...}}`
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Stable machine-readable code for clients
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::PaymentRequired(_) => "INSUFFICIENT_FUNDS",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ExternalServiceError(_) => "PROVIDER_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::DatabaseError(_)
            | ApiError::ServiceUnavailable(_)
            | ApiError::ExternalServiceError(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<GiftError> for ApiError {
    fn from(err: GiftError) -> Self {
        match err {
            GiftError::Validation(msg) => ApiError::ValidationError(msg),
            e @ GiftError::InsufficientFunds { .. } => ApiError::PaymentRequired(e.to_string()),
            GiftError::ProviderUnavailable(msg) => ApiError::ExternalServiceError(msg),
            e @ GiftError::ProviderRequestFailed { .. } => {
                ApiError::ExternalServiceError(e.to_string())
            }
            GiftError::Configuration(msg) => ApiError::ServiceUnavailable(msg),
            GiftError::NotFound(msg) => ApiError::NotFound(msg),
            GiftError::Conflict(msg) => ApiError::Conflict(msg),
            GiftError::CancellationRejected(msg) => ApiError::UnprocessableEntity(msg),
            GiftError::Storage(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        GiftError::from(err).into()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

/// Handler result
pub type ApiResult<T> = Result<T, ApiError>;

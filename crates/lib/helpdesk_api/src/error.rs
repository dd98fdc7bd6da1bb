//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helpdesk_core::auth::AuthError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// Messages carried by `Unavailable` and `Internal` stay in server logs; the
/// client only sees the stable code and a generic summary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "timeout",
                "Request timed out",
            ),
            AppError::Unavailable(detail) => {
                warn!(%detail, "upstream unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "Authentication service unavailable",
                )
            }
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::AccountNotFound => AppError::NotFound("Account not found".into()),
            AuthError::AccountDisabled => AppError::Unauthorized("Account is disabled".into()),
            AuthError::TokenError(cause) => {
                debug!(%cause, "token rejected");
                AppError::Unauthorized("Invalid or expired token".into())
            }
            AuthError::TokenExpired => AppError::Unauthorized("Invalid or expired token".into()),
            AuthError::RefreshTokenRevoked => {
                AppError::Unauthorized("Invalid refresh token".into())
            }
            AuthError::SessionRejected(cause) => {
                debug!(%cause, "session rejected");
                AppError::Unauthorized("Session is no longer valid".into())
            }
            AuthError::DirectoryUnavailable(m) => AppError::Unavailable(m),
            AuthError::Timeout => AppError::Timeout,
            AuthError::ValidationError(m) => AppError::Validation(m),
            AuthError::DbError(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(m) => AppError::Internal(m),
        }
    }
}

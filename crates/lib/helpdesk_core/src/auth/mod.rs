//! Authentication and session lifecycle.
//!
//! Directory verification, shadow-account reconciliation, token issuance and
//! refresh-token bookkeeping, shared by `helpdesk_api` and the server binary.

pub mod accounts;
pub mod directory;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod permission;
pub mod queries;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Directory rejected the credentials, or the login is unknown there.
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Token expired")]
    TokenExpired,

    /// Well-signed refresh token that the ledger no longer holds.
    #[error("Refresh token revoked or already used")]
    RefreshTokenRevoked,

    /// A session cannot be extended (account vanished or was disabled).
    #[error("Session rejected: {0}")]
    SessionRejected(String),

    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

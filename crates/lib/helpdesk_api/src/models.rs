//! Request and response bodies.

use chrono::{DateTime, Utc};
use helpdesk_core::auth::permission::Permission;
use helpdesk_core::models::auth::{ShadowAccount, TokenPair};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /auth/login` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub senha: String,
}

/// `POST /auth/refresh` body.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
    /// Reconciled account; present on login only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountView>,
}

impl TokenResponse {
    pub fn new(tokens: TokenPair, account: Option<AccountView>) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: "Bearer".to_string(),
            account,
        }
    }
}

/// Public view of a shadow account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub login: String,
    pub email: String,
    pub permission: Permission,
    pub active: bool,
    pub avatar: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ShadowAccount> for AccountView {
    fn from(a: &ShadowAccount) -> Self {
        Self {
            id: a.id,
            name: a.name.clone(),
            login: a.login.clone(),
            email: a.email.clone(),
            permission: a.permission,
            active: a.active,
            avatar: a.avatar.clone(),
            last_login: a.last_login,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
    /// Refresh tokens invalidated.
    pub revoked: u64,
}

/// `POST /users` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub login: String,
}

/// `PATCH /users/{id}/permission` body.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionUpdate {
    pub permission: Permission,
}

/// `PATCH /users/{id}/status` body.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

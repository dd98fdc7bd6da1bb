//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `helpdesk_api::models` (which carry camelCase renames etc.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::permission::Permission;

/// Local record mirroring a directory identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowAccount {
    /// Assigned once at first successful authentication, never changes.
    pub id: Uuid,
    /// External identity key, unique across accounts.
    pub login: String,
    pub name: String,
    pub email: String,
    pub permission: Permission,
    pub active: bool,
    pub avatar: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write request for [`AccountStore::upsert`](crate::auth::accounts::AccountStore::upsert).
///
/// `id: None` asks the store to provision (or, if the login already exists,
/// reuse) an account; `id: Some` updates that record.
#[derive(Debug, Clone)]
pub struct AccountUpsert {
    pub id: Option<Uuid>,
    pub login: String,
    pub name: String,
    pub email: String,
    pub permission: Permission,
    pub active: bool,
    pub avatar: Option<String>,
}

impl AccountUpsert {
    /// A first-sight account: lowest privilege, active.
    pub fn provision(login: &str, name: &str, email: &str, avatar: Option<String>) -> Self {
        Self {
            id: None,
            login: login.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            permission: Permission::default(),
            active: true,
            avatar,
        }
    }

    /// An update of an existing account, keeping every attribute as stored.
    pub fn from_account(account: &ShadowAccount) -> Self {
        Self {
            id: Some(account.id),
            login: account.login.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            permission: account.permission,
            active: account.active,
            avatar: account.avatar.clone(),
        }
    }
}

/// Which half of a session pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity payload embedded in signed tokens.
///
/// Registered fields left unset (`iss`, `jti`, zero timestamps) are stamped by
/// the [`TokenIssuer`](crate::auth::jwt::TokenIssuer); a stamped value is a new
/// claims value, the input is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject: the account id.
    pub sub: String,
    /// Display name.
    pub name: String,
    pub login: String,
    pub email: String,
    pub permission: Permission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub typ: TokenKind,
}

impl IdentityClaims {
    /// Unstamped claims for an account.
    pub fn for_account(account: &ShadowAccount, typ: TokenKind) -> Self {
        Self {
            sub: account.id.to_string(),
            name: account.name.clone(),
            login: account.login.clone(),
            email: account.email.clone(),
            permission: account.permission,
            iss: None,
            iat: 0,
            nbf: 0,
            exp: 0,
            jti: None,
            typ,
        }
    }

    /// Parse the subject back into an account id.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Freshly minted access + refresh tokens.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

//! JWT token generation and verification.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info};

use super::AuthError;
use crate::models::auth::{IdentityClaims, TokenKind};
use crate::uuid::new_token_id;

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_SECS: i64 = 7 * 24 * 60 * 60;

/// Default `iss` stamped on tokens that carry none.
pub const DEFAULT_ISSUER: &str = "helpdesk";

/// The only signing algorithm accepted, for issuing and for validation.
const PINNED_ALGORITHM: Algorithm = Algorithm::HS256;

/// Lifetimes and issuer applied when stamping claims.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub issuer: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    /// Grace window (seconds) around `exp`/`nbf` checks. 0 = strict.
    pub leeway_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl_secs: ACCESS_TOKEN_EXPIRY_SECS,
            refresh_ttl_secs: REFRESH_TOKEN_EXPIRY_SECS,
            leeway_secs: 0,
        }
    }
}

/// Mints and validates HS256 session tokens with a symmetric key.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    settings: TokenSettings,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &PINNED_ALGORITHM)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], settings: TokenSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            settings,
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// When a refresh token issued now stops being redeemable.
    pub fn refresh_expiry(&self) -> DateTime<Utc> {
        let ttl = TimeDelta::try_seconds(self.settings.refresh_ttl_secs).unwrap_or(TimeDelta::MAX);
        Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Sign a short-lived access token for `claims`.
    pub fn issue_access_token(&self, claims: &IdentityClaims) -> Result<String, AuthError> {
        self.issue(claims, TokenKind::Access, self.settings.access_ttl_secs)
    }

    /// Sign a long-lived refresh token for `claims`.
    pub fn issue_refresh_token(&self, claims: &IdentityClaims) -> Result<String, AuthError> {
        self.issue(claims, TokenKind::Refresh, self.settings.refresh_ttl_secs)
    }

    fn issue(
        &self,
        claims: &IdentityClaims,
        typ: TokenKind,
        ttl_secs: i64,
    ) -> Result<String, AuthError> {
        let stamped = self.stamp(claims, typ, ttl_secs);
        encode(&Header::new(PINNED_ALGORITHM), &stamped, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Copy of `claims` with timestamps set from now and missing `jti`/`iss` filled.
    fn stamp(&self, claims: &IdentityClaims, typ: TokenKind, ttl_secs: i64) -> IdentityClaims {
        let now = Utc::now().timestamp();
        let mut stamped = claims.clone();
        stamped.typ = typ;
        stamped.iat = now;
        stamped.nbf = now;
        stamped.exp = now + ttl_secs;
        if stamped.jti.is_none() {
            stamped.jti = Some(new_token_id());
        }
        if stamped.iss.is_none() {
            stamped.iss = Some(self.settings.issuer.clone());
        }
        stamped
    }

    /// Verify signature, algorithm and time bounds; return the embedded claims.
    ///
    /// A token is expired once `now >= exp + leeway`.
    pub fn parse_and_validate(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let mut validation = Validation::new(PINNED_ALGORITHM);
        validation.leeway = self.settings.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "sub"]);

        let data = decode::<IdentityClaims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidAlgorithm => {
                    AuthError::TokenError("algorithm not allowed".into())
                }
                _ => AuthError::TokenError(e.to_string()),
            }
        })?;

        let claims = data.claims;
        let leeway = i64::try_from(self.settings.leeway_secs).unwrap_or(i64::MAX);
        if Utc::now().timestamp() >= claims.exp.saturating_add(leeway) {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("helpdesk")
        .join("jwt-secret")
}

//! Authentication service. Login, refresh, logout and account lookups,
//! delegating verification to the directory and storage to `helpdesk_core`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use helpdesk_core::auth::AuthError;
use helpdesk_core::auth::accounts::AccountStore;
use helpdesk_core::auth::directory::{DirectoryAuthenticator, DirectoryError};
use helpdesk_core::auth::jwt::TokenIssuer;
use helpdesk_core::auth::ledger::RefreshTokenLedger;
use helpdesk_core::auth::permission::Permission;
use helpdesk_core::models::auth::{
    AccountUpsert, IdentityClaims, ShadowAccount, TokenKind, TokenPair,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub account: ShadowAccount,
}

/// Use-case layer tying directory, account store, issuer and ledger together.
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn RefreshTokenLedger>,
    directory: Arc<dyn DirectoryAuthenticator>,
    issuer: TokenIssuer,
    login_timeout: Duration,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn RefreshTokenLedger>,
        directory: Arc<dyn DirectoryAuthenticator>,
        issuer: TokenIssuer,
        login_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            ledger,
            directory,
            issuer,
            login_timeout,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Authenticate against the directory and open a session.
    ///
    /// Runs lookup → verify → reconcile → touch → issue under the login
    /// deadline. Wrong secrets and unknown logins fail identically.
    pub async fn login(&self, login: &str, secret: &str) -> Result<LoginOutcome, AuthError> {
        let login = normalize_login(login)?;
        tokio::time::timeout(self.login_timeout, self.login_steps(&login, secret))
            .await
            .map_err(|_| {
                warn!(%login, timeout = ?self.login_timeout, "login timed out");
                AuthError::Timeout
            })?
    }

    async fn login_steps(&self, login: &str, secret: &str) -> Result<LoginOutcome, AuthError> {
        let existing = self.accounts.find_by_login(login).await?;

        let identity = self
            .directory
            .authenticate(login, secret)
            .await
            .map_err(|e| match e {
                DirectoryError::InvalidCredentials | DirectoryError::NotFound(_) => {
                    info!(%login, "login rejected by directory");
                    AuthError::CredentialError
                }
                DirectoryError::Unavailable(m) => AuthError::DirectoryUnavailable(m),
            })?;

        // Directory attributes win on every login; id, permission and status
        // stay as stored.
        let account = self
            .accounts
            .upsert(AccountUpsert::provision(
                login,
                &identity.display_name,
                &identity.email,
                identity.avatar,
            ))
            .await?;
        if existing.is_none() {
            info!(%login, user_id = %account.id, "shadow account created");
        }
        if !account.active {
            info!(%login, user_id = %account.id, "login refused for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        self.touch(&account).await;

        let tokens = self.issue_pair(&account).await?;
        info!(%login, user_id = %account.id, "login succeeded");
        Ok(LoginOutcome { tokens, account })
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// consumed before the replacement is issued, even if issuing then fails.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.issuer.parse_and_validate(refresh_token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(AuthError::TokenError("not a refresh token".into()));
        }
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::TokenError("malformed subject".into()))?;

        if !self.ledger.exists(refresh_token).await? {
            warn!(%user_id, jti = ?claims.jti, "unknown or replayed refresh token");
            return Err(AuthError::RefreshTokenRevoked);
        }
        // A concurrent exchange of the same token may win between the two calls.
        if !self.ledger.delete(refresh_token).await? {
            warn!(%user_id, jti = ?claims.jti, "refresh token consumed concurrently");
            return Err(AuthError::RefreshTokenRevoked);
        }

        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::SessionRejected(format!("account {user_id} not found")))?;
        if !account.active {
            return Err(AuthError::SessionRejected(format!(
                "account {user_id} is disabled"
            )));
        }

        self.touch(&account).await;

        let tokens = self.issue_pair(&account).await?;
        debug!(%user_id, "session refreshed");
        Ok(tokens)
    }

    /// Revoke every refresh token of the caller. Access tokens already issued
    /// stay valid until they expire.
    pub async fn logout(&self, claims: &IdentityClaims) -> Result<u64, AuthError> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::TokenError("malformed subject".into()))?;
        let revoked = self.ledger.delete_by_user(user_id).await?;
        info!(%user_id, revoked, "logged out everywhere");
        Ok(revoked)
    }

    /// Current state of the caller's account.
    pub async fn me(&self, claims: &IdentityClaims) -> Result<ShadowAccount, AuthError> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::TokenError("malformed subject".into()))?;
        match self.accounts.find_by_id(user_id).await? {
            Some(account) if account.active => Ok(account),
            _ => Err(AuthError::AccountNotFound),
        }
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Create (or refresh) a shadow account from a directory lookup, without
    /// a credential check.
    pub async fn provision(&self, login: &str) -> Result<ShadowAccount, AuthError> {
        let login = normalize_login(login)?;
        let entry = self
            .directory
            .search_by_login(&login)
            .await
            .map_err(|e| match e {
                DirectoryError::NotFound(_) | DirectoryError::InvalidCredentials => {
                    AuthError::AccountNotFound
                }
                DirectoryError::Unavailable(m) => AuthError::DirectoryUnavailable(m),
            })?;
        let account = self
            .accounts
            .upsert(AccountUpsert::provision(
                &login,
                &entry.display_name,
                &entry.email,
                None,
            ))
            .await?;
        info!(%login, user_id = %account.id, "account provisioned");
        Ok(account)
    }

    pub async fn set_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<ShadowAccount, AuthError> {
        let account = self.accounts.set_permission(user_id, permission).await?;
        info!(%user_id, %permission, "permission changed");
        Ok(account)
    }

    /// Activate or deactivate an account; deactivation revokes its refresh tokens.
    pub async fn set_active(&self, user_id: Uuid, active: bool) -> Result<ShadowAccount, AuthError> {
        let account = self.accounts.set_active(user_id, active).await?;
        if !active {
            let revoked = self.ledger.delete_by_user(user_id).await?;
            info!(%user_id, revoked, "account deactivated");
        } else {
            info!(%user_id, "account activated");
        }
        Ok(account)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Best-effort `last_login` update; the session is granted regardless.
    async fn touch(&self, account: &ShadowAccount) {
        if let Err(e) = self
            .accounts
            .touch_last_login(&account.login, Utc::now())
            .await
        {
            warn!(login = %account.login, error = %e, "failed to record last login");
        }
    }

    /// Mint an access + refresh pair from the account and record the refresh token.
    async fn issue_pair(&self, account: &ShadowAccount) -> Result<TokenPair, AuthError> {
        let claims = IdentityClaims::for_account(account, TokenKind::Access);
        let access_token = self.issuer.issue_access_token(&claims)?;
        let refresh_token = self.issuer.issue_refresh_token(&claims)?;
        self.ledger
            .save(&refresh_token, account.id, self.issuer.refresh_expiry())
            .await
            .inspect_err(|e| {
                error!(user_id = %account.id, error = %e, "failed to record refresh token");
            })?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.issuer.settings().access_ttl_secs,
        })
    }
}

/// Logins are matched case-insensitively; the shadow key is the lowercase form.
fn normalize_login(login: &str) -> Result<String, AuthError> {
    let login = login.trim();
    if login.is_empty() {
        return Err(AuthError::ValidationError("login must not be empty".into()));
    }
    Ok(login.to_lowercase())
}

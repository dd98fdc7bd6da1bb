//! PostgreSQL backings for the account store and refresh token ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use super::accounts::AccountStore;
use super::permission::Permission;
use super::ledger::{RefreshTokenLedger, hash_token};
use crate::models::auth::{AccountUpsert, ShadowAccount};
use crate::uuid::new_account_id;

/// `(id, login, name, email, permission, active, avatar, last_login, created_at, updated_at)`
type AccountRow = (
    Uuid,
    String,
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn account_from_row(row: AccountRow) -> Result<ShadowAccount, AuthError> {
    let (id, login, name, email, permission, active, avatar, last_login, created_at, updated_at) =
        row;
    let permission = permission
        .parse()
        .map_err(|e| AuthError::Internal(format!("account {id}: {e}")))?;
    Ok(ShadowAccount {
        id,
        login,
        name,
        email,
        permission,
        active,
        avatar,
        last_login,
        created_at,
        updated_at,
    })
}

/// Unique-constraint violations become validation errors.
fn map_write_error(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &e
        && db.code().as_deref() == Some("23505")
    {
        return AuthError::ValidationError("login already belongs to another account".into());
    }
    AuthError::DbError(e)
}

/// Account store over the `accounts` table.
///
/// `UNIQUE(login)` plus `ON CONFLICT` serializes concurrent first logins.
#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_login(&self, login: &str) -> Result<Option<ShadowAccount>, AuthError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, login, name, email, permission, active, avatar, last_login, created_at, updated_at \
             FROM accounts WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        row.map(account_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ShadowAccount>, AuthError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, login, name, email, permission, active, avatar, last_login, created_at, updated_at \
             FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(account_from_row).transpose()
    }

    async fn upsert(&self, account: AccountUpsert) -> Result<ShadowAccount, AuthError> {
        let row = match account.id {
            None => sqlx::query_as::<_, AccountRow>(
                "INSERT INTO accounts (id, login, name, email, permission, active, avatar) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (login) DO UPDATE \
                 SET name = EXCLUDED.name, email = EXCLUDED.email, avatar = EXCLUDED.avatar, \
                     updated_at = now() \
                 RETURNING id, login, name, email, permission, active, avatar, last_login, created_at, updated_at",
            )
            .bind(new_account_id())
            .bind(&account.login)
            .bind(&account.name)
            .bind(&account.email)
            .bind(account.permission.as_str())
            .bind(account.active)
            .bind(&account.avatar)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?,
            Some(id) => sqlx::query_as::<_, AccountRow>(
                "UPDATE accounts \
                 SET login = $2, name = $3, email = $4, permission = $5, active = $6, avatar = $7, \
                     updated_at = now() \
                 WHERE id = $1 \
                 RETURNING id, login, name, email, permission, active, avatar, last_login, created_at, updated_at",
            )
            .bind(id)
            .bind(&account.login)
            .bind(&account.name)
            .bind(&account.email)
            .bind(account.permission.as_str())
            .bind(account.active)
            .bind(&account.avatar)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .ok_or(AuthError::AccountNotFound)?,
        };
        account_from_row(row)
    }

    async fn touch_last_login(&self, login: &str, at: DateTime<Utc>) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE accounts SET last_login = $2 WHERE login = $1")
            .bind(login)
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::AccountNotFound);
        }
        Ok(())
    }

    async fn set_permission(
        &self,
        id: Uuid,
        permission: Permission,
    ) -> Result<ShadowAccount, AuthError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "UPDATE accounts SET permission = $2, updated_at = now() WHERE id = $1 \
             RETURNING id, login, name, email, permission, active, avatar, last_login, created_at, updated_at",
        )
        .bind(id)
        .bind(permission.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
        account_from_row(row)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<ShadowAccount, AuthError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "UPDATE accounts SET active = $2, updated_at = now() WHERE id = $1 \
             RETURNING id, login, name, email, permission, active, avatar, last_login, created_at, updated_at",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
        account_from_row(row)
    }
}

/// Refresh token ledger over the `refresh_tokens` table (hashes only).
#[derive(Debug, Clone)]
pub struct PgRefreshLedger {
    pool: PgPool,
}

impl PgRefreshLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenLedger for PgRefreshLedger {
    async fn save(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (token_hash) DO UPDATE \
             SET user_id = EXCLUDED.user_id, expires_at = EXCLUDED.expires_at",
        )
        .bind(hash_token(token))
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(&self, token: &str) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens \
             WHERE token_hash = $1 AND expires_at > now())",
        )
        .bind(hash_token(token))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn delete(&self, token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

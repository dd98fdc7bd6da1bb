//! Shadow account store.
//!
//! The store contract is shared by the in-memory backing below and the
//! PostgreSQL backing in [`super::queries`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use super::permission::Permission;
use crate::models::auth::{AccountUpsert, ShadowAccount};
use crate::uuid::new_account_id;

/// Local copies of directory identities, keyed by id and by login.
///
/// Implementations must make `upsert` atomic with respect to both keys: two
/// concurrent first-time upserts for one login yield one account, and the
/// second caller gets the id assigned by the first.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_login(&self, login: &str) -> Result<Option<ShadowAccount>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ShadowAccount>, AuthError>;

    /// Provision (`id: None`) or update (`id: Some`) an account.
    ///
    /// With `id: None` and a login that already exists, only the directory
    /// attributes (name, email, avatar) are refreshed; id, permission and
    /// status are kept.
    async fn upsert(&self, account: AccountUpsert) -> Result<ShadowAccount, AuthError>;

    /// Set `last_login` for the account with this login.
    /// Fails with [`AuthError::AccountNotFound`] if there is none.
    async fn touch_last_login(&self, login: &str, at: DateTime<Utc>) -> Result<(), AuthError>;

    /// Change only the permission of account `id`, leaving every other field
    /// as currently stored.
    async fn set_permission(
        &self,
        id: Uuid,
        permission: Permission,
    ) -> Result<ShadowAccount, AuthError>;

    /// Change only the active flag of account `id`.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<ShadowAccount, AuthError>;
}

#[derive(Debug, Default)]
struct Indexes {
    by_id: HashMap<Uuid, ShadowAccount>,
    by_login: HashMap<String, Uuid>,
}

/// In-memory store; both indexes sit behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    inner: RwLock<Indexes>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_login(&self, login: &str) -> Result<Option<ShadowAccount>, AuthError> {
        let idx = self.inner.read().await;
        Ok(idx
            .by_login
            .get(login)
            .and_then(|id| idx.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ShadowAccount>, AuthError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn upsert(&self, account: AccountUpsert) -> Result<ShadowAccount, AuthError> {
        let mut idx = self.inner.write().await;
        let now = Utc::now();

        let stored = match account.id {
            Some(id) => {
                let current = idx.by_id.get(&id).ok_or(AuthError::AccountNotFound)?;
                if current.login != account.login {
                    if idx.by_login.get(&account.login).is_some_and(|other| *other != id) {
                        return Err(AuthError::ValidationError(format!(
                            "login '{}' already belongs to another account",
                            account.login
                        )));
                    }
                    let old_login = current.login.clone();
                    idx.by_login.remove(&old_login);
                }
                let current = &idx.by_id[&id];
                ShadowAccount {
                    id,
                    login: account.login,
                    name: account.name,
                    email: account.email,
                    permission: account.permission,
                    active: account.active,
                    avatar: account.avatar,
                    last_login: current.last_login,
                    created_at: current.created_at,
                    updated_at: now,
                }
            }
            None => match idx.by_login.get(&account.login).copied() {
                Some(id) => {
                    let current = &idx.by_id[&id];
                    ShadowAccount {
                        name: account.name,
                        email: account.email,
                        avatar: account.avatar,
                        updated_at: now,
                        ..current.clone()
                    }
                }
                None => {
                    let id = new_account_id();
                    debug!(login = %account.login, user_id = %id, "provisioning shadow account");
                    ShadowAccount {
                        id,
                        login: account.login,
                        name: account.name,
                        email: account.email,
                        permission: account.permission,
                        active: account.active,
                        avatar: account.avatar,
                        last_login: None,
                        created_at: now,
                        updated_at: now,
                    }
                }
            },
        };

        idx.by_login.insert(stored.login.clone(), stored.id);
        idx.by_id.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn touch_last_login(&self, login: &str, at: DateTime<Utc>) -> Result<(), AuthError> {
        let mut idx = self.inner.write().await;
        let id = *idx.by_login.get(login).ok_or(AuthError::AccountNotFound)?;
        let account = idx.by_id.get_mut(&id).ok_or(AuthError::AccountNotFound)?;
        account.last_login = Some(at);
        Ok(())
    }

    async fn set_permission(
        &self,
        id: Uuid,
        permission: Permission,
    ) -> Result<ShadowAccount, AuthError> {
        let mut idx = self.inner.write().await;
        let account = idx.by_id.get_mut(&id).ok_or(AuthError::AccountNotFound)?;
        account.permission = permission;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<ShadowAccount, AuthError> {
        let mut idx = self.inner.write().await;
        let account = idx.by_id.get_mut(&id).ok_or(AuthError::AccountNotFound)?;
        account.active = active;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }
}

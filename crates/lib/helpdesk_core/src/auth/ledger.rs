//! Refresh token ledger: which refresh tokens are currently redeemable.
//!
//! Tokens are keyed by their SHA-256 hash so the ledger never holds a usable
//! bearer secret.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AuthError;

/// SHA-256 hash a refresh token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Ledger of valid refresh tokens.
///
/// `delete_by_user` only guarantees removal of tokens saved before it
/// started; a token saved concurrently for the same user may survive.
/// Entries past `expires_at` never count as present and are pruned on `save`.
#[async_trait]
pub trait RefreshTokenLedger: Send + Sync {
    /// Record `token` as valid for `user_id` until `expires_at`. Saving the
    /// same token twice is a no-op.
    async fn save(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    async fn exists(&self, token: &str) -> Result<bool, AuthError>;

    /// Invalidate one token. Returns whether it was present.
    async fn delete(&self, token: &str) -> Result<bool, AuthError>;

    /// Invalidate every token of a user. Returns how many were removed.
    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64, AuthError>;
}

#[derive(Debug, Clone, Copy)]
struct LedgerEntry {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// In-memory ledger keyed by token hash.
#[derive(Debug, Default)]
pub struct MemoryRefreshLedger {
    tokens: RwLock<HashMap<String, LedgerEntry>>,
}

impl MemoryRefreshLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired ones not yet pruned included.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl RefreshTokenLedger for MemoryRefreshLedger {
    async fn save(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, entry| entry.expires_at > now);
        tokens.insert(
            hash_token(token),
            LedgerEntry {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn exists(&self, token: &str) -> Result<bool, AuthError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .read()
            .await
            .get(&hash_token(token))
            .is_some_and(|entry| entry.expires_at > now))
    }

    async fn delete(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.tokens.write().await.remove(&hash_token(token)).is_some())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, entry| entry.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }
}

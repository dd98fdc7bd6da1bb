//! Directory authenticator contract and a file-backed static directory.
//!
//! Secrets are only ever checked by binding as the identity; nothing here
//! persists locally, reconciliation is the caller's job.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::password::{BCRYPT_COST, hash_secret_with_cost, verify_secret};

/// Directory boundary errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No directory entry for '{0}'")]
    NotFound(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Attributes returned by a successful [`DirectoryAuthenticator::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryIdentity {
    /// Login as spelled by the directory.
    pub login: String,
    pub display_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub permission_hint: Option<String>,
}

/// Read-only lookup result of [`DirectoryAuthenticator::search_by_login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub login: String,
    pub display_name: String,
    pub email: String,
}

#[async_trait]
pub trait DirectoryAuthenticator: Send + Sync {
    /// Verify credentials, returning no data.
    async fn bind(&self, login: &str, secret: &str) -> Result<(), DirectoryError>;

    /// Locate the identity (service bind if configured), rebind as it with
    /// `secret`, and return its attributes. An empty secret always fails.
    async fn authenticate(
        &self,
        login: &str,
        secret: &str,
    ) -> Result<DirectoryIdentity, DirectoryError>;

    /// Look up an identity without checking any secret.
    async fn search_by_login(&self, login: &str) -> Result<DirectoryEntry, DirectoryError>;
}

/// Directory attribute names for each identity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    pub login: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub permission: String,
}

impl Default for AttributeMap {
    fn default() -> Self {
        Self {
            login: "uid".into(),
            name: "displayName".into(),
            email: "mail".into(),
            avatar: "jpegPhoto".into(),
            permission: "employeeType".into(),
        }
    }
}

/// Directory connection settings.
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    /// Service address, e.g. `ldap://dc1.example.org:389`.
    pub url: Option<String>,
    /// Service identity used to locate entries before the credential bind.
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    /// Search scope; only entries under this DN are visible.
    pub base_dn: String,
    pub attributes: AttributeMap,
    /// JSON entry file for [`StaticDirectory`].
    pub entries_file: Option<PathBuf>,
}

impl DirectoryConfig {
    /// Reads directory settings from the environment.
    ///
    /// | Variable                   | Default          |
    /// |----------------------------|------------------|
    /// | `DIRECTORY_URL`            | unset            |
    /// | `DIRECTORY_BIND_DN`        | unset (no service bind) |
    /// | `DIRECTORY_BIND_PASSWORD`  | unset            |
    /// | `DIRECTORY_BASE_DN`        | empty (whole tree) |
    /// | `DIRECTORY_ENTRIES_FILE`   | unset            |
    /// | `DIRECTORY_ATTR_*`         | see [`AttributeMap::default`] |
    pub fn from_env() -> Self {
        let defaults = AttributeMap::default();
        let attr = |var: &str, default: String| non_empty_env(var).unwrap_or(default);
        Self {
            url: non_empty_env("DIRECTORY_URL"),
            bind_dn: non_empty_env("DIRECTORY_BIND_DN"),
            bind_password: non_empty_env("DIRECTORY_BIND_PASSWORD"),
            base_dn: non_empty_env("DIRECTORY_BASE_DN").unwrap_or_default(),
            attributes: AttributeMap {
                login: attr("DIRECTORY_ATTR_LOGIN", defaults.login),
                name: attr("DIRECTORY_ATTR_NAME", defaults.name),
                email: attr("DIRECTORY_ATTR_EMAIL", defaults.email),
                avatar: attr("DIRECTORY_ATTR_AVATAR", defaults.avatar),
                permission: attr("DIRECTORY_ATTR_PERMISSION", defaults.permission),
            },
            entries_file: non_empty_env("DIRECTORY_ENTRIES_FILE").map(PathBuf::from),
        }
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// One entry of a static directory file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticEntry {
    pub dn: String,
    /// bcrypt hash of the entry's secret.
    pub secret_hash: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Checked against when a login has no entry, so a miss costs one bcrypt
/// verification like a wrong secret does.
const DECOY_SECRET: &str = "static-directory-decoy";

/// Directory served from a fixed set of entries.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    config: DirectoryConfig,
    entries: Vec<StaticEntry>,
    decoy_hash: String,
}

impl StaticDirectory {
    pub fn new(config: DirectoryConfig, entries: Vec<StaticEntry>) -> Self {
        let cost = entries
            .iter()
            .find_map(|e| bcrypt_cost(&e.secret_hash))
            .unwrap_or(BCRYPT_COST);
        let decoy_hash = hash_secret_with_cost(DECOY_SECRET, cost).unwrap_or_else(|e| {
            warn!(error = %e, cost, "failed to build decoy hash");
            String::new()
        });
        Self {
            config,
            entries,
            decoy_hash,
        }
    }

    /// Load entries from `config.entries_file`; no file means an empty directory.
    pub fn from_config(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let entries: Vec<StaticEntry> = match &config.entries_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    DirectoryError::Unavailable(format!("read {}: {e}", path.display()))
                })?;
                serde_json::from_str(&raw).map_err(|e| {
                    DirectoryError::Unavailable(format!("parse {}: {e}", path.display()))
                })?
            }
            None => {
                warn!("no directory entries file configured; every login will fail");
                Vec::new()
            }
        };
        debug!(entries = entries.len(), base_dn = %config.base_dn, "static directory loaded");
        Ok(Self::new(config, entries))
    }

    fn in_scope(&self, entry: &StaticEntry) -> bool {
        let base = self.config.base_dn.trim();
        base.is_empty()
            || entry
                .dn
                .to_ascii_lowercase()
                .ends_with(&base.to_ascii_lowercase())
    }

    fn attribute<'a>(entry: &'a StaticEntry, name: &str) -> Option<&'a str> {
        entry
            .attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Entry whose login attribute matches `login` under Unicode lowercasing.
    fn find(&self, login: &str) -> Option<&StaticEntry> {
        let login_attr = &self.config.attributes.login;
        let wanted = login.to_lowercase();
        self.entries.iter().find(|entry| {
            self.in_scope(entry)
                && Self::attribute(entry, login_attr).is_some_and(|v| v.to_lowercase() == wanted)
        })
    }

    /// Spend the same bcrypt work as a real bind; the outcome is ignored.
    async fn verify_decoy(&self, secret: &str) {
        let secret = secret.to_string();
        let hash = self.decoy_hash.clone();
        let _ = tokio::task::spawn_blocking(move || verify_secret(&secret, &hash)).await;
    }

    /// Bind as the configured service identity, if any.
    async fn service_bind(&self) -> Result<(), DirectoryError> {
        let Some(bind_dn) = &self.config.bind_dn else {
            return Ok(());
        };
        let entry = self
            .entries
            .iter()
            .find(|e| e.dn.eq_ignore_ascii_case(bind_dn))
            .ok_or_else(|| DirectoryError::Unavailable("service bind failed".into()))?;
        let password = self.config.bind_password.as_deref().unwrap_or_default();
        Self::bind_entry(entry, password).await.map_err(|e| match e {
            DirectoryError::InvalidCredentials => {
                DirectoryError::Unavailable("service bind failed".into())
            }
            other => other,
        })
    }

    async fn bind_entry(entry: &StaticEntry, secret: &str) -> Result<(), DirectoryError> {
        if secret.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }
        let secret = secret.to_string();
        let hash = entry.secret_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_secret(&secret, &hash))
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("bind task: {e}")))?
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        if matches {
            Ok(())
        } else {
            Err(DirectoryError::InvalidCredentials)
        }
    }

    fn canonical_login(&self, entry: &StaticEntry) -> String {
        Self::attribute(entry, &self.config.attributes.login)
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl DirectoryAuthenticator for StaticDirectory {
    async fn bind(&self, login: &str, secret: &str) -> Result<(), DirectoryError> {
        if secret.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }
        let Some(entry) = self.find(login) else {
            self.verify_decoy(secret).await;
            return Err(DirectoryError::InvalidCredentials);
        };
        Self::bind_entry(entry, secret).await
    }

    async fn authenticate(
        &self,
        login: &str,
        secret: &str,
    ) -> Result<DirectoryIdentity, DirectoryError> {
        if secret.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }
        self.service_bind().await?;
        let Some(entry) = self.find(login) else {
            self.verify_decoy(secret).await;
            return Err(DirectoryError::NotFound(login.to_string()));
        };
        Self::bind_entry(entry, secret).await?;

        let attrs = &self.config.attributes;
        let canonical = self.canonical_login(entry);
        Ok(DirectoryIdentity {
            display_name: Self::attribute(entry, &attrs.name)
                .unwrap_or(canonical.as_str())
                .to_string(),
            email: Self::attribute(entry, &attrs.email)
                .unwrap_or_default()
                .to_string(),
            avatar: Self::attribute(entry, &attrs.avatar).map(str::to_string),
            permission_hint: Self::attribute(entry, &attrs.permission).map(str::to_string),
            login: canonical,
        })
    }

    async fn search_by_login(&self, login: &str) -> Result<DirectoryEntry, DirectoryError> {
        self.service_bind().await?;
        let entry = self
            .find(login)
            .ok_or_else(|| DirectoryError::NotFound(login.to_string()))?;
        let canonical = self.canonical_login(entry);
        Ok(DirectoryEntry {
            display_name: Self::attribute(entry, &self.config.attributes.name)
                .unwrap_or(canonical.as_str())
                .to_string(),
            email: Self::attribute(entry, &self.config.attributes.email)
                .unwrap_or_default()
                .to_string(),
            login: canonical,
        })
    }
}

/// Cost factor of a `$2b$NN$...` hash.
fn bcrypt_cost(hash: &str) -> Option<u32> {
    hash.split('$').nth(2)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::auth::password::hash_secret_with_cost;

    fn entry(dn: &str, uid: &str, secret: &str) -> StaticEntry {
        StaticEntry {
            dn: dn.into(),
            secret_hash: hash_secret_with_cost(secret, 4).unwrap(),
            attributes: HashMap::from([
                ("uid".to_string(), uid.to_string()),
                ("displayName".to_string(), format!("{uid} display")),
                ("mail".to_string(), format!("{uid}@example.org")),
            ]),
        }
    }

    fn directory(config: DirectoryConfig) -> StaticDirectory {
        StaticDirectory::new(
            config,
            vec![
                entry("uid=alice,ou=people,dc=example,dc=org", "alice", "wonderland"),
                entry("uid=eve,ou=contractors,dc=example,dc=org", "eve", "hunter2"),
                entry("cn=svc,ou=services,dc=example,dc=org", "svc", "svc-pass"),
            ],
        )
    }

    #[tokio::test]
    async fn authenticate_returns_attributes() {
        let dir = directory(DirectoryConfig::default());
        let id = dir.authenticate("alice", "wonderland").await.unwrap();
        assert_eq!(id.login, "alice");
        assert_eq!(id.display_name, "alice display");
        assert_eq!(id.email, "alice@example.org");
        assert_eq!(id.avatar, None);
        assert_eq!(id.permission_hint, None);
    }

    #[tokio::test]
    async fn login_match_is_case_insensitive_and_canonicalized() {
        let dir = directory(DirectoryConfig::default());
        let id = dir.authenticate("ALICE", "wonderland").await.unwrap();
        assert_eq!(id.login, "alice");
    }

    #[tokio::test]
    async fn wrong_or_empty_secret_fails() {
        let dir = directory(DirectoryConfig::default());
        assert!(matches!(
            dir.authenticate("alice", "nope").await,
            Err(DirectoryError::InvalidCredentials)
        ));
        assert!(matches!(
            dir.authenticate("alice", "").await,
            Err(DirectoryError::InvalidCredentials)
        ));
        assert!(matches!(
            dir.bind("alice", "").await,
            Err(DirectoryError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn non_ascii_login_matches_case_insensitively() {
        let dir = StaticDirectory::new(
            DirectoryConfig::default(),
            vec![entry(
                "uid=Ångström,ou=people,dc=example,dc=org",
                "Ångström",
                "lumen",
            )],
        );
        for login in ["Ångström", "ångström", "ÅNGSTRÖM"] {
            let id = dir.authenticate(login, "lumen").await.unwrap();
            assert_eq!(id.login, "Ångström");
        }
    }

    #[test]
    fn decoy_hash_uses_the_entries_cost() {
        let dir = directory(DirectoryConfig::default());
        assert_eq!(bcrypt_cost(&dir.decoy_hash), Some(4));
        assert_eq!(
            bcrypt_cost(&StaticDirectory::new(DirectoryConfig::default(), vec![]).decoy_hash),
            Some(BCRYPT_COST)
        );
    }

    #[tokio::test]
    async fn unknown_login_costs_as_much_as_a_wrong_secret() {
        let known = StaticEntry {
            secret_hash: hash_secret_with_cost("right", 8).unwrap(),
            ..entry("uid=alice,ou=people,dc=example,dc=org", "alice", "unused")
        };
        let dir = StaticDirectory::new(DirectoryConfig::default(), vec![known]);

        let started = std::time::Instant::now();
        assert!(dir.authenticate("alice", "wrong").await.is_err());
        let wrong_secret = started.elapsed();

        let started = std::time::Instant::now();
        assert!(dir.authenticate("mallory", "wrong").await.is_err());
        let unknown_login = started.elapsed();

        assert!(
            unknown_login * 4 >= wrong_secret,
            "unknown login {unknown_login:?} vs wrong secret {wrong_secret:?}"
        );
    }

    #[tokio::test]
    async fn unknown_login_is_not_found() {
        let dir = directory(DirectoryConfig::default());
        assert!(matches!(
            dir.authenticate("mallory", "x").await,
            Err(DirectoryError::NotFound(_))
        ));
        assert!(matches!(
            dir.bind("mallory", "x").await,
            Err(DirectoryError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn base_dn_limits_search_scope() {
        let dir = directory(DirectoryConfig {
            base_dn: "ou=people,dc=example,dc=org".into(),
            ..DirectoryConfig::default()
        });
        assert!(dir.bind("alice", "wonderland").await.is_ok());
        assert!(matches!(
            dir.authenticate("eve", "hunter2").await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn service_bind_gates_lookups() {
        let good = directory(DirectoryConfig {
            bind_dn: Some("cn=svc,ou=services,dc=example,dc=org".into()),
            bind_password: Some("svc-pass".into()),
            ..DirectoryConfig::default()
        });
        assert_eq!(
            good.search_by_login("eve").await.unwrap(),
            DirectoryEntry {
                login: "eve".into(),
                display_name: "eve display".into(),
                email: "eve@example.org".into(),
            }
        );

        let bad = directory(DirectoryConfig {
            bind_dn: Some("cn=svc,ou=services,dc=example,dc=org".into()),
            bind_password: Some("wrong".into()),
            ..DirectoryConfig::default()
        });
        assert!(matches!(
            bad.authenticate("alice", "wonderland").await,
            Err(DirectoryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn custom_attribute_mapping() {
        let mut e = entry("uid=bob,dc=example,dc=org", "ignored", "pw");
        e.attributes.insert("sAMAccountName".into(), "bob".into());
        e.attributes.insert("title".into(), "technician".into());
        let dir = StaticDirectory::new(
            DirectoryConfig {
                attributes: AttributeMap {
                    login: "sAMAccountName".into(),
                    permission: "title".into(),
                    ..AttributeMap::default()
                },
                ..DirectoryConfig::default()
            },
            vec![e],
        );
        let id = dir.authenticate("bob", "pw").await.unwrap();
        assert_eq!(id.login, "bob");
        assert_eq!(id.permission_hint.as_deref(), Some("technician"));
    }

    #[tokio::test]
    async fn loads_entries_from_file() {
        let entries = vec![entry("uid=alice,dc=example,dc=org", "alice", "wonderland")];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&entries).unwrap().as_bytes())
            .unwrap();

        let dir = StaticDirectory::from_config(DirectoryConfig {
            entries_file: Some(file.path().to_path_buf()),
            ..DirectoryConfig::default()
        })
        .unwrap();
        assert!(dir.bind("alice", "wonderland").await.is_ok());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let result = StaticDirectory::from_config(DirectoryConfig {
            entries_file: Some(PathBuf::from("/nonexistent/helpdesk-entries.json")),
            ..DirectoryConfig::default()
        });
        assert!(matches!(result, Err(DirectoryError::Unavailable(_))));
    }
}

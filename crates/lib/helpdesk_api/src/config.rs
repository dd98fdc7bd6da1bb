//! API server configuration.

use std::fmt;
use std::time::Duration;

use helpdesk_core::auth::directory::DirectoryConfig;
use helpdesk_core::auth::jwt::{
    ACCESS_TOKEN_EXPIRY_SECS, DEFAULT_ISSUER, REFRESH_TOKEN_EXPIRY_SECS, TokenSettings,
    resolve_jwt_secret,
};

/// Default bound on a protected handler's execution.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default bound on the whole login flow, directory round trip included.
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 10;

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL; `None` keeps accounts and tokens in memory.
    pub database_url: Option<String>,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Issuer, lifetimes and expiry leeway for session tokens.
    pub tokens: TokenSettings,
    pub request_timeout: Duration,
    pub login_timeout: Duration,
    pub directory: DirectoryConfig,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("jwt_secret", &"<redacted>")
            .field("tokens", &self.tokens)
            .field("request_timeout", &self.request_timeout)
            .field("login_timeout", &self.login_timeout)
            .field("directory", &self.directory.url)
            .finish()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                          |
    /// |---------------------------|----------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3200`                 |
    /// | `DATABASE_URL`            | unset (in-memory stores)         |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file |
    /// | `JWT_ISSUER`              | `helpdesk`                       |
    /// | `ACCESS_TOKEN_TTL_SECS`   | `900`                            |
    /// | `REFRESH_TOKEN_TTL_SECS`  | `604800`                         |
    /// | `TOKEN_LEEWAY_SECS`       | `0`                              |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                             |
    /// | `LOGIN_TIMEOUT_SECS`      | `10`                             |
    ///
    /// Directory settings come from [`DirectoryConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            jwt_secret: resolve_jwt_secret(),
            tokens: TokenSettings {
                issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.into()),
                access_ttl_secs: env_parse("ACCESS_TOKEN_TTL_SECS", ACCESS_TOKEN_EXPIRY_SECS),
                refresh_ttl_secs: env_parse("REFRESH_TOKEN_TTL_SECS", REFRESH_TOKEN_EXPIRY_SECS),
                leeway_secs: env_parse("TOKEN_LEEWAY_SECS", 0),
            },
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            login_timeout: Duration::from_secs(env_parse(
                "LOGIN_TIMEOUT_SECS",
                DEFAULT_LOGIN_TIMEOUT_SECS,
            )),
            directory: DirectoryConfig::from_env(),
        }
    }

    /// Defaults with an explicit secret and nothing read from the environment.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: None,
            jwt_secret: jwt_secret.into(),
            tokens: TokenSettings::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            login_timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
            directory: DirectoryConfig::default(),
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

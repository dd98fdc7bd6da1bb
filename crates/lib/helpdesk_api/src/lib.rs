//! # helpdesk_api
//!
//! HTTP API library for Helpdesk: directory login, token refresh, logout and
//! account administration behind the session pipeline.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use helpdesk_core::auth::accounts::{AccountStore, MemoryAccountStore};
use helpdesk_core::auth::directory::DirectoryAuthenticator;
use helpdesk_core::auth::jwt::TokenIssuer;
use helpdesk_core::auth::ledger::{MemoryRefreshLedger, RefreshTokenLedger};
use helpdesk_core::auth::queries::{PgAccountStore, PgRefreshLedger};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{auth, users};
use crate::services::auth::AuthService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Session lifecycle service.
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn RefreshTokenLedger>,
        directory: Arc<dyn DirectoryAuthenticator>,
    ) -> Self {
        let issuer = TokenIssuer::new(config.jwt_secret.as_bytes(), config.tokens.clone());
        let auth = AuthService::new(accounts, ledger, directory, issuer, config.login_timeout);
        Self {
            config,
            auth: Arc::new(auth),
        }
    }

    /// State backed by in-process stores; nothing survives a restart.
    pub fn in_memory(config: ApiConfig, directory: Arc<dyn DirectoryAuthenticator>) -> Self {
        Self::new(
            config,
            Arc::new(MemoryAccountStore::new()),
            Arc::new(MemoryRefreshLedger::new()),
            directory,
        )
    }

    /// State backed by PostgreSQL.
    pub fn postgres(
        config: ApiConfig,
        pool: PgPool,
        directory: Arc<dyn DirectoryAuthenticator>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(PgAccountStore::new(pool.clone())),
            Arc::new(PgRefreshLedger::new(pool)),
            directory,
        )
    }
}

/// Run embedded database migrations.
///
/// Delegates to `helpdesk_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    helpdesk_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = middleware::public(
        Router::new()
            .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
            .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler)),
        &state,
    );

    // Protected routes (access token + access table)
    let protected = middleware::protect(
        Router::new()
            .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
            .route(routes::GET_AUTH_ME, get(auth::me_handler))
            .route(routes::POST_USERS, post(users::provision_handler))
            .route(
                routes::PATCH_USERS_ID_PERMISSION,
                patch(users::set_permission_handler),
            )
            .route(
                routes::PATCH_USERS_ID_STATUS,
                patch(users::set_status_handler),
            ),
        &state,
    );

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

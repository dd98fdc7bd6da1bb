//! Integration tests — build the router over in-memory stores and a static
//! directory, drive it with `oneshot` requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use chrono::{DateTime, Utc};
use helpdesk_api::config::ApiConfig;
use helpdesk_api::{AppState, middleware};
use helpdesk_core::auth::AuthError;
use helpdesk_core::auth::accounts::MemoryAccountStore;
use helpdesk_core::auth::directory::{DirectoryConfig, StaticDirectory, StaticEntry};
use helpdesk_core::auth::jwt::{TokenIssuer, TokenSettings};
use helpdesk_core::auth::ledger::{MemoryRefreshLedger, RefreshTokenLedger};
use helpdesk_core::auth::password::hash_secret_with_cost;
use helpdesk_core::auth::permission::Permission;
use helpdesk_core::models::auth::{IdentityClaims, TokenKind};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret";

fn entry(uid: &str, secret: &str) -> StaticEntry {
    StaticEntry {
        dn: format!("uid={uid},ou=people,dc=example,dc=org"),
        secret_hash: hash_secret_with_cost(secret, 4).unwrap(),
        attributes: HashMap::from([
            ("uid".to_string(), uid.to_string()),
            ("displayName".to_string(), format!("{uid} example")),
            ("mail".to_string(), format!("{uid}@example.org")),
        ]),
    }
}

fn state() -> AppState {
    let directory = StaticDirectory::new(
        DirectoryConfig::default(),
        vec![entry("alice", "wonderland"), entry("root", "toor")],
    );
    AppState::in_memory(ApiConfig::with_secret(SECRET), Arc::new(directory))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp: Response = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn post_json(uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn patch_json(uri: &str, body: Value, bearer: &str) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router, login: &str, secret: &str) -> Value {
    let (status, body) = send(
        app,
        post_json("/auth/login", json!({ "login": login, "senha": secret }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body
}

/// Log `root` in once, promote it, and return a fresh admin access token.
async fn admin_token(app: &Router, state: &AppState) -> String {
    let first = login(app, "root", "toor").await;
    let id = first["account"]["id"].as_str().unwrap().parse().unwrap();
    state.auth.set_permission(id, Permission::Admin).await.unwrap();
    let again = login(app, "root", "toor").await;
    again["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn login_returns_tokens_and_reconciled_account() {
    let app = helpdesk_api::router(state());
    let body = login(&app, "Alice", "wonderland").await;

    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 900);
    assert!(body["accessToken"].is_string());
    assert!(body["refreshToken"].is_string());
    assert_eq!(body["account"]["login"], "alice");
    assert_eq!(body["account"]["permission"], "user");
    assert_eq!(body["account"]["active"], true);
}

#[tokio::test]
async fn failed_logins_are_indistinguishable() {
    let app = helpdesk_api::router(state());
    let (s1, b1) = send(
        &app,
        post_json("/auth/login", json!({ "login": "alice", "senha": "nope" }), None),
    )
    .await;
    let (s2, b2) = send(
        &app,
        post_json("/auth/login", json!({ "login": "nobody", "senha": "nope" }), None),
    )
    .await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(b1, b2);
}

#[tokio::test]
async fn me_requires_a_valid_access_token() {
    let app = helpdesk_api::router(state());

    let (status, _) = send(&app, get_with("/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get_with("/auth/me", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let session = login(&app, "alice", "wonderland").await;
    let access = session["accessToken"].as_str().unwrap();
    let (status, body) = send(&app, get_with("/auth/me", Some(access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], "alice");
    assert_eq!(body["id"], session["account"]["id"]);

    let refresh = session["refreshToken"].as_str().unwrap();
    let (status, _) = send(&app, get_with("/auth/me", Some(refresh))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_is_rejected() {
    let app = helpdesk_api::router(state());
    let session = login(&app, "alice", "wonderland").await;

    let issuer = TokenIssuer::new(
        SECRET.as_bytes(),
        TokenSettings {
            access_ttl_secs: 0,
            ..TokenSettings::default()
        },
    );
    let claims = IdentityClaims {
        sub: session["account"]["id"].as_str().unwrap().to_string(),
        name: "alice example".into(),
        login: "alice".into(),
        email: "alice@example.org".into(),
        permission: Permission::User,
        iss: None,
        iat: 0,
        nbf: 0,
        exp: 0,
        jti: None,
        typ: TokenKind::Access,
    };
    let expired = issuer.issue_access_token(&claims).unwrap();

    let (status, _) = send(&app, get_with("/auth/me", Some(&expired))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_distinguish_forbidden_from_unauthenticated() {
    let state = state();
    let app = helpdesk_api::router(state.clone());

    let (status, _) = send(&app, post_json("/users", json!({ "login": "alice" }), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = login(&app, "alice", "wonderland").await;
    let user_token = user["accessToken"].as_str().unwrap();
    let (status, body) = send(
        &app,
        post_json("/users", json!({ "login": "alice" }), Some(user_token)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let admin = admin_token(&app, &state).await;
    let (status, body) = send(
        &app,
        post_json("/users", json!({ "login": "alice" }), Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], user["account"]["id"]);
}

#[tokio::test]
async fn admin_can_change_permission_and_status() {
    let state = state();
    let app = helpdesk_api::router(state.clone());
    let admin = admin_token(&app, &state).await;

    let user = login(&app, "alice", "wonderland").await;
    let id = user["account"]["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        patch_json(
            &format!("/users/{id}/permission"),
            json!({ "permission": "support" }),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permission"], "support");

    let (status, body) = send(
        &app,
        patch_json(&format!("/users/{id}/status"), json!({ "active": false }), &admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    // Deactivation revoked the refresh token and blocks new logins.
    let (status, _) = send(
        &app,
        post_json(
            "/auth/refresh",
            json!({ "refresh_token": user["refreshToken"] }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        post_json("/auth/login", json!({ "login": "alice", "senha": "wonderland" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_account_id_is_not_found() {
    let state = state();
    let app = helpdesk_api::router(state.clone());
    let admin = admin_token(&app, &state).await;

    let (status, _) = send(
        &app,
        patch_json(
            &format!("/users/{}/status", uuid::Uuid::now_v7()),
            json!({ "active": false }),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refresh_tokens_are_single_use() {
    let app = helpdesk_api::router(state());
    let session = login(&app, "alice", "wonderland").await;
    let refresh = session["refreshToken"].clone();

    let (status, body) = send(
        &app,
        post_json("/auth/refresh", json!({ "refresh_token": refresh }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["refreshToken"], refresh);
    assert!(body.get("account").is_none());

    let (status, _) = send(
        &app,
        post_json("/auth/refresh", json!({ "refresh_token": refresh }), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_every_refresh_token() {
    let app = helpdesk_api::router(state());
    let first = login(&app, "alice", "wonderland").await;
    let second = login(&app, "alice", "wonderland").await;
    let access = second["accessToken"].as_str().unwrap();

    let (status, body) = send(&app, post_json("/auth/logout", json!({}), Some(access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["revoked"], 2);

    for session in [&first, &second] {
        let (status, _) = send(
            &app,
            post_json(
                "/auth/refresh",
                json!({ "refresh_token": session["refreshToken"] }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The access token lives on until it expires.
    let (status, _) = send(&app, get_with("/auth/me", Some(access))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_route_missing_from_access_table_is_forbidden() {
    let state = state();
    let app = middleware::protect(
        Router::new().route("/unlisted", get(|| async { "reached" })),
        &state,
    )
    .with_state(state.clone());

    let full = helpdesk_api::router(state);
    let session = login(&full, "alice", "wonderland").await;
    let access = session["accessToken"].as_str().unwrap();

    let (status, _) = send(&app, get_with("/unlisted", Some(access))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

async fn explode() -> &'static str {
    panic!("kaboom")
}

#[tokio::test]
async fn handler_panic_becomes_internal_error() {
    let state = state();
    let app = middleware::public(Router::new().route("/boom", get(explode)), &state)
        .with_state(state.clone());

    let (status, body) = send(&app, get_with("/boom", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
    assert!(!body["message"].as_str().unwrap().contains("kaboom"));

    // The service keeps serving after a panic.
    let (status, _) = send(&app, get_with("/boom", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn slow_handler_times_out() {
    let app: Router = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            Duration::from_millis(20),
            middleware::timeout::enforce_timeout,
        ));

    let (status, body) = send(&app, get_with("/slow", None)).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error"], "timeout");
}

/// Saves normally; lookups never answer.
#[derive(Default)]
struct StalledLedger {
    inner: MemoryRefreshLedger,
}

#[async_trait]
impl RefreshTokenLedger for StalledLedger {
    async fn save(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.inner.save(token, user_id, expires_at).await
    }

    async fn exists(&self, _token: &str) -> Result<bool, AuthError> {
        std::future::pending().await
    }

    async fn delete(&self, token: &str) -> Result<bool, AuthError> {
        self.inner.delete(token).await
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        self.inner.delete_by_user(user_id).await
    }
}

#[tokio::test]
async fn stalled_refresh_times_out() {
    let mut config = ApiConfig::with_secret(SECRET);
    config.request_timeout = Duration::from_millis(50);
    let directory = StaticDirectory::new(
        DirectoryConfig::default(),
        vec![entry("alice", "wonderland")],
    );
    let state = AppState::new(
        config,
        Arc::new(MemoryAccountStore::new()),
        Arc::new(StalledLedger::default()),
        Arc::new(directory),
    );
    let app = helpdesk_api::router(state);

    let session = login(&app, "alice", "wonderland").await;
    let refresh = session["refreshToken"].as_str().unwrap();

    let (status, body) = send(
        &app,
        post_json("/auth/refresh", json!({ "refresh_token": refresh }), None),
    )
    .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error"], "timeout");
}

//! Session request handlers.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AccountView, LoginRequest, LogoutResponse, RefreshRequest, TokenResponse};

/// `POST /auth/login` — verify directory credentials and open a session.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let outcome = state.auth.login(&body.login, &body.senha).await?;
    let account = AccountView::from(&outcome.account);
    Ok(Json(TokenResponse::new(outcome.tokens, Some(account))))
}

/// `POST /auth/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let tokens = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(TokenResponse::new(tokens, None)))
}

/// `POST /auth/logout` — revoke all of the caller's refresh tokens.
pub async fn logout_handler(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LogoutResponse>> {
    let revoked = state.auth.logout(&claims).await?;
    Ok(Json(LogoutResponse {
        success: true,
        revoked,
    }))
}

/// `GET /auth/me` — the caller's account as currently stored.
pub async fn me_handler(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AccountView>> {
    let account = state.auth.me(&claims).await?;
    Ok(Json(AccountView::from(&account)))
}

//! Authentication middleware: Bearer token extraction and JWT verification,
//! plus the permission gate that follows it.

use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use helpdesk_core::models::auth::{IdentityClaims, TokenKind};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::routes::allowed_permissions;

/// Validated claims, stored in request extensions by [`require_auth`].
///
/// Also an extractor: handlers behind [`require_auth`] take it as an argument.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub IdentityClaims);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the
/// access token, and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state.auth.issuer().parse_and_validate(token)?;
    if claims.typ != TokenKind::Access {
        debug!(jti = ?claims.jti, "refresh token presented as access token");
        return Err(AppError::Unauthorized("Invalid or expired token".into()));
    }

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// Axum middleware: rejects with 403 unless the caller's permission is in the
/// matched route's entry of the access table. Must run after [`require_auth`].
pub async fn require_permission(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| request.uri().path());

    let allowed = allowed_permissions(request.method(), path).unwrap_or_default();
    if !allowed.contains(&user.0.permission) {
        debug!(
            login = %user.0.login,
            permission = %user.0.permission,
            path,
            "permission denied"
        );
        return Err(AppError::Forbidden("Insufficient permission".into()));
    }

    Ok(next.run(request).await)
}

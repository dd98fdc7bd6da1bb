//! Account administration handlers. Admin only, enforced by the access table.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AccountView, PermissionUpdate, ProvisionRequest, StatusUpdate};

/// `POST /users` — provision a shadow account from a directory lookup.
pub async fn provision_handler(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(body): Json<ProvisionRequest>,
) -> AppResult<(StatusCode, Json<AccountView>)> {
    info!(by = %admin.login, login = %body.login, "provision requested");
    let account = state.auth.provision(&body.login).await?;
    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

/// `PATCH /users/{id}/permission` — change an account's permission code.
pub async fn set_permission_handler(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PermissionUpdate>,
) -> AppResult<Json<AccountView>> {
    info!(by = %admin.login, user_id = %id, permission = %body.permission, "permission change requested");
    let account = state.auth.set_permission(id, body.permission).await?;
    Ok(Json(AccountView::from(&account)))
}

/// `PATCH /users/{id}/status` — activate or deactivate an account.
pub async fn set_status_handler(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> AppResult<Json<AccountView>> {
    info!(by = %admin.login, user_id = %id, active = body.active, "status change requested");
    let account = state.auth.set_active(id, body.active).await?;
    Ok(Json(AccountView::from(&account)))
}

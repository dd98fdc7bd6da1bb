//! Route paths and the access table for protected routes.

use axum::http::Method;
use helpdesk_core::auth::permission::Permission;

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const POST_USERS: &str = "/users";
pub const PATCH_USERS_ID_PERMISSION: &str = "/users/{id}/permission";
pub const PATCH_USERS_ID_STATUS: &str = "/users/{id}/status";

/// Permissions allowed on one protected route.
#[derive(Debug)]
pub struct RouteAccess {
    pub method: Method,
    pub path: &'static str,
    pub allowed: &'static [Permission],
}

const ANY_PERMISSION: &[Permission] = &Permission::ALL;
const ADMIN_ONLY: &[Permission] = &[Permission::Admin];

/// Every protected route must appear here; unlisted routes are forbidden.
pub static ACCESS_TABLE: &[RouteAccess] = &[
    RouteAccess {
        method: Method::POST,
        path: POST_AUTH_LOGOUT,
        allowed: ANY_PERMISSION,
    },
    RouteAccess {
        method: Method::GET,
        path: GET_AUTH_ME,
        allowed: ANY_PERMISSION,
    },
    RouteAccess {
        method: Method::POST,
        path: POST_USERS,
        allowed: ADMIN_ONLY,
    },
    RouteAccess {
        method: Method::PATCH,
        path: PATCH_USERS_ID_PERMISSION,
        allowed: ADMIN_ONLY,
    },
    RouteAccess {
        method: Method::PATCH,
        path: PATCH_USERS_ID_STATUS,
        allowed: ADMIN_ONLY,
    },
];

/// Look up the allow-list for a matched route template.
pub fn allowed_permissions(method: &Method, path: &str) -> Option<&'static [Permission]> {
    ACCESS_TABLE
        .iter()
        .find(|r| r.method == *method && r.path == path)
        .map(|r| r.allowed)
}

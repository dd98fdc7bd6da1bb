//! Request pipelines.
//!
//! Protected routes, outermost first: recovery, timeout, authentication,
//! authorization, then the handler. A request without a valid access token
//! never reaches handler code. Public routes stop after the timeout.

pub mod auth;
pub mod recovery;
pub mod timeout;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use tower::ServiceBuilder;

use crate::AppState;

/// Wrap every route of `router` in the protected pipeline.
pub fn protect(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(
        ServiceBuilder::new()
            .layer(from_fn(recovery::recover))
            .layer(from_fn_with_state(
                state.config.request_timeout,
                timeout::enforce_timeout,
            ))
            .layer(from_fn_with_state(state.clone(), auth::require_auth))
            .layer(from_fn(auth::require_permission)),
    )
}

/// Public routes get the panic net and the deadline, nothing else.
pub fn public(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(
        ServiceBuilder::new()
            .layer(from_fn(recovery::recover))
            .layer(from_fn_with_state(
                state.config.request_timeout,
                timeout::enforce_timeout,
            )),
    )
}

//! # helpdesk_core
//!
//! Core domain logic for Helpdesk: directory-backed authentication, shadow
//! accounts, signed session tokens and refresh-token bookkeeping.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

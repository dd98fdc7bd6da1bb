//! Use-case services, one per resource family.

pub mod auth;

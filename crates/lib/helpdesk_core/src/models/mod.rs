//! Domain models shared by the auth subsystem and its HTTP layer.

pub mod auth;

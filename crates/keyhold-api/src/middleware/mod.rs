//! Middleware for the admin API

pub mod auth;

pub use auth::{admin_auth, TokenRegistry};

//! Admin API routes for Keyhold
//!
//! Authentication provider management for the caller's tenant, plus an
//! unauthenticated liveness check.

mod auth_config;
mod response;
mod server;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::auth::admin_auth;
use crate::server::AppState;

pub use auth_config::*;
pub use response::ApiError;
pub use server::*;

/// Create the admin API router
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Authentication provider
        .route(
            "/auth/config",
            get(get_auth_config).put(put_auth_config),
        )
        .route("/auth/directory/preview", post(preview_directory))
        .route_layer(middleware::from_fn_with_state(state, admin_auth))
        // Liveness, no token required
        .route("/health", get(health_check))
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Authenticated Router Module
///
/// Self-service routes for any holder of a valid token, regardless of role.
///
/// Access Control Strategy:
/// The router is wrapped in the `auth_middleware` layer, and the handlers additionally take
/// the `AuthUser` extractor to learn *which* account is calling. Every operation here is
/// scoped to that account.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /public/auth/current-user
        .route(
            "/public/auth/current-user",
            get(handlers::auth::current_user),
        )
        // PATCH /public/auth/update-user
        // Profile update of the calling account. The active flag can not be changed here.
        .route(
            "/public/auth/update-user",
            patch(handlers::auth::update_current_user),
        )
}

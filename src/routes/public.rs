use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are **unauthenticated** and accessible to any client.
///
/// Visibility Mandate:
/// The page handlers in this module only return pages that are active and whose ancestors
/// are all active. Hidden subtrees must never leak through the public tree, the slug lookup
/// or the children listing.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancer checks.
        .route("/health", get(handlers::health))
        // POST /public/auth/register
        // Self-registration of a regular user; answers with a bearer token.
        .route("/public/auth/register", post(handlers::auth::register))
        // POST /public/auth/login
        .route("/public/auth/login", post(handlers::auth::login))
        // GET /public/pages
        // Navigation tree of all visible pages.
        .route("/public/pages", get(handlers::pages::get_routes))
        // GET /public/pages/{slug}
        .route("/public/pages/{slug}", get(handlers::pages::get_page_by_slug))
        // GET /public/pages/{slug}/children?page=&perPage=
        .route(
            "/public/pages/{slug}/children",
            get(handlers::pages::get_page_children),
        )
}

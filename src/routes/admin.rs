use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Admin Router Module
///
/// Content and account management, nested under `/admin`.
///
/// Access Control:
/// `admin_routes` must be wrapped in the `admin_middleware` layer, which resolves the
/// `AdminUser` extractor (valid token *and* `role = ADMIN`) before any handler runs.
/// `admin_auth_routes` stays open: it is how an administrator obtains a token.
pub fn admin_routes(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        // --- Users ---
        // POST /admin/users/find
        // Filtered, sorted and paginated search over all accounts.
        .route("/users/find", post(handlers::users::find_users))
        .route("/users", post(handlers::users::create_user))
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // --- Pages ---
        .route(
            "/pages",
            get(handlers::pages::list_pages).post(handlers::pages::create_page),
        )
        .route(
            "/pages/{id}",
            get(handlers::pages::get_page)
                .patch(handlers::pages::update_page)
                .delete(handlers::pages::delete_page),
        )
        // POST /admin/pages/{id}/upload
        // Multipart image upload. The body limit only applies to this route.
        .route(
            "/pages/{id}/upload",
            post(handlers::pages::upload_image).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
}

/// Unprotected part of the admin surface.
pub fn admin_auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(handlers::auth::admin_login))
}

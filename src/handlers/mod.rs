//! HTTP handlers.
//!
//! Handlers stay thin: extract and validate the request, call the matching service and
//! wrap the result. Every handler is annotated for the OpenAPI document.

pub mod auth;
pub mod pages;
pub mod users;

/// health
///
/// Liveness probe used by load balancers and monitoring.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// Router Module Index
///
/// Organizes the application's routing logic into access-segregated modules. Access control
/// is applied explicitly at the module level (via Axum layers in `create_router`), so a
/// protected endpoint can not be exposed by accident.

/// Routes accessible to anonymous clients: health, login/registration and the public page tree.
/// Page handlers only ever return publicly visible pages.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware (any valid token).
pub mod authenticated;

/// Routes under `/admin`, restricted to the `ADMIN` role (except the admin login itself).
pub mod admin;

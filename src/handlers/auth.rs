use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{LoginRequest, RegisterRequest, TokenResponse, UpdateUserRequest, UserDto},
    services::users::{self, LoginScope},
    validation::ValidatedJson,
};

/// register
///
/// [Public Route] Self-registration. Creates an active `USER` account and returns its token.
#[utoipa::path(
    post,
    path = "/public/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = TokenResponse),
        (status = 400, description = "Invalid payload or email taken", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = users::register(state.repo.as_ref(), &state.config, payload).await?;
    Ok(Json(token))
}

/// login
///
/// [Public Route] Exchanges credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/public/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Wrong password", body = ErrorBody),
        (status = 404, description = "Unknown email", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = users::login(state.repo.as_ref(), &state.config, LoginScope::Public, payload).await?;
    Ok(Json(token))
}

/// admin_login
///
/// [Public Route] Same as `login`, but only administrators get a token (403 otherwise).
#[utoipa::path(
    post,
    path = "/admin/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Wrong password", body = ErrorBody),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 404, description = "Unknown email", body = ErrorBody)
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = users::login(state.repo.as_ref(), &state.config, LoginScope::Admin, payload).await?;
    Ok(Json(token))
}

/// current_user
///
/// [Authenticated Route] The account behind the bearer token.
#[utoipa::path(
    get,
    path = "/public/auth/current-user",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 401, description = "Missing token", body = ErrorBody)
    )
)]
pub async fn current_user(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserDto>, AppError> {
    Ok(Json(users::get_user(state.repo.as_ref(), id).await?))
}

/// update_current_user
///
/// [Authenticated Route] Self-service profile update. `isActive` is ignored.
#[utoipa::path(
    patch,
    path = "/public/auth/update-user",
    tag = "auth",
    security(("bearer" = [])),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserDto),
        (status = 400, description = "Invalid payload or email taken", body = ErrorBody)
    )
)]
pub async fn update_current_user(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserDto>, AppError> {
    Ok(Json(
        users::update_user(state.repo.as_ref(), id, payload, false).await?,
    ))
}

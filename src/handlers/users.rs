use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{AppError, ErrorBody},
    models::{CreateUserRequest, FindUsersRequest, FindUsersResponse, UpdateUserRequest, UserDto},
    services::users,
    validation::{ValidatedJson, parse_id},
};

/// find_users
///
/// [Admin Route] Filtered, sorted and paginated user search.
#[utoipa::path(
    post,
    path = "/admin/users/find",
    tag = "users",
    security(("bearer" = [])),
    request_body = FindUsersRequest,
    responses(
        (status = 200, description = "Matching users", body = FindUsersResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody)
    )
)]
pub async fn find_users(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<FindUsersRequest>,
) -> Result<Json<FindUsersResponse>, AppError> {
    Ok(Json(users::find_users(state.repo.as_ref(), payload).await?))
}

/// get_user
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id (UUID)")),
    responses(
        (status = 200, description = "User", body = UserDto),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDto>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(users::get_user(state.repo.as_ref(), id).await?))
}

/// create_user
///
/// [Admin Route] Creates a regular user account.
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "users",
    security(("bearer" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserDto),
        (status = 400, description = "Invalid payload or email taken", body = ErrorBody)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let user = users::create_user(state.repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// update_user
#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id (UUID)")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserDto),
        (status = 400, description = "Invalid payload or email taken", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserDto>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(
        users::update_user(state.repo.as_ref(), id, payload, true).await?,
    ))
}

/// delete_user
///
/// [Admin Route] Deletes the account and returns it as it was.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = UserDto),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDto>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(users::delete_user(state.repo.as_ref(), id).await?))
}

use uuid::Uuid;

use super::is_unique_violation;
use crate::{
    auth::{hash_password, issue_token, verify_password},
    config::AppConfig,
    error::AppError,
    models::{
        CreateUserRequest, FindUsersRequest, FindUsersResponse, LoginRequest, RegisterRequest,
        TokenResponse, UpdateUserRequest, UserDto, UserRole,
    },
    repository::{NewUser, Repository, UserChanges},
    tree::total_pages,
};

/// Which login endpoint is being used. The admin endpoint only accepts administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginScope {
    Public,
    Admin,
}

fn user_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("User with id - {} does not exist", id))
}

fn email_taken(email: &str) -> AppError {
    AppError::bad_request(format!("User with email - {} already exists", email))
}

/// Maps a unique-index race on the email column to the same 400 as the explicit check.
fn map_insert_error(err: sqlx::Error, email: &str) -> AppError {
    if is_unique_violation(&err) {
        email_taken(email)
    } else {
        AppError::Database(err)
    }
}

async fn ensure_email_free(
    repo: &dyn Repository,
    email: &str,
    owner: Option<Uuid>,
) -> Result<(), AppError> {
    match repo.find_user_by_email(email).await? {
        Some(existing) if Some(existing.id) != owner => Err(email_taken(email)),
        _ => Ok(()),
    }
}

/// login
///
/// Lookup order: unknown email (404), wrong scope (403), wrong password (401).
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    scope: LoginScope,
    dto: LoginRequest,
) -> Result<TokenResponse, AppError> {
    let user = repo
        .find_user_by_email(&dto.email)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("User with email {} does not exist", dto.email))
        })?;

    if scope == LoginScope::Admin && user.role != UserRole::Admin {
        tracing::warn!(user_id = %user.id, "non-admin attempted admin login");
        return Err(AppError::forbidden());
    }

    if !verify_password(&dto.password, &user.password)? {
        return Err(AppError::unauthorized("Wrong password"));
    }

    tracing::info!(user_id = %user.id, ?scope, "user logged in");
    Ok(TokenResponse {
        token: issue_token(&user, config)?,
    })
}

/// register
///
/// Self-registration: always a regular, active user. Returns a token right away.
pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    dto: RegisterRequest,
) -> Result<TokenResponse, AppError> {
    ensure_email_free(repo, &dto.email, None).await?;

    let user = repo
        .insert_user(NewUser {
            first_name: dto.first_name,
            last_name: dto.last_name,
            email: dto.email.clone(),
            password_hash: hash_password(&dto.password)?,
            role: UserRole::User,
            is_active: true,
        })
        .await
        .map_err(|e| map_insert_error(e, &dto.email))?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(TokenResponse {
        token: issue_token(&user, config)?,
    })
}

pub async fn find_users(
    repo: &dyn Repository,
    req: FindUsersRequest,
) -> Result<FindUsersResponse, AppError> {
    let (users, count) = repo.find_users(&req).await?;

    Ok(FindUsersResponse {
        data: users.iter().map(UserDto::from).collect(),
        page: req.page,
        per_page: req.per_page,
        total_pages: total_pages(count, req.per_page),
    })
}

pub async fn get_user(repo: &dyn Repository, id: Uuid) -> Result<UserDto, AppError> {
    let user = repo
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    Ok(UserDto::from(&user))
}

/// create_user
///
/// Admin-side account creation. The account is always a regular user.
pub async fn create_user(
    repo: &dyn Repository,
    dto: CreateUserRequest,
) -> Result<UserDto, AppError> {
    ensure_email_free(repo, &dto.email, None).await?;

    let user = repo
        .insert_user(NewUser {
            first_name: dto.first_name,
            last_name: dto.last_name,
            email: dto.email.clone(),
            password_hash: hash_password(&dto.password)?,
            role: UserRole::User,
            is_active: dto.is_active,
        })
        .await
        .map_err(|e| map_insert_error(e, &dto.email))?;

    tracing::info!(user_id = %user.id, "user created");
    Ok(UserDto::from(&user))
}

/// update_user
///
/// Partial update. `allow_status` is false on the self-service route, where `isActive`
/// is silently ignored.
pub async fn update_user(
    repo: &dyn Repository,
    id: Uuid,
    dto: UpdateUserRequest,
    allow_status: bool,
) -> Result<UserDto, AppError> {
    let existing = repo
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    if let Some(email) = dto.email.as_deref() {
        if email != existing.email {
            ensure_email_free(repo, email, Some(id)).await?;
        }
    }

    let password_hash = match dto.password.as_deref() {
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };

    let changes = UserChanges {
        first_name: dto.first_name,
        last_name: dto.last_name,
        email: dto.email.clone(),
        password_hash,
        is_active: if allow_status { dto.is_active } else { None },
    };

    let updated = repo
        .update_user(id, changes)
        .await
        .map_err(|e| map_insert_error(e, dto.email.as_deref().unwrap_or(&existing.email)))?
        .ok_or_else(|| user_not_found(id))?;

    tracing::info!(user_id = %id, "user updated");
    Ok(UserDto::from(&updated))
}

pub async fn delete_user(repo: &dyn Repository, id: Uuid) -> Result<UserDto, AppError> {
    let deleted = repo
        .delete_user(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    tracing::info!(user_id = %id, "user deleted");
    Ok(UserDto::from(&deleted))
}

/// ensure_admin
///
/// Seeds the configured administrator account when no user owns its email yet.
pub async fn ensure_admin(repo: &dyn Repository, config: &AppConfig) -> Result<(), AppError> {
    let email = config.admin_email.trim().to_lowercase();
    if repo.find_user_by_email(&email).await?.is_some() {
        tracing::debug!(%email, "admin account already present");
        return Ok(());
    }

    let admin = repo
        .insert_user(NewUser {
            first_name: "Admin".to_string(),
            last_name: "Admin".to_string(),
            email,
            password_hash: hash_password(&config.admin_password)?,
            role: UserRole::Admin,
            is_active: true,
        })
        .await?;

    tracing::info!(user_id = %admin.id, "admin account created");
    Ok(())
}

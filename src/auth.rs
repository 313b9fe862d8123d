use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::{User, UserRole},
};

/// Work factor used for every stored password hash.
pub const BCRYPT_COST: u32 = 8;

/// Claims
///
/// The payload of every issued JSON Web Token. Signed with the server secret (HS256) and
/// validated on every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user.
    pub sub: Uuid,
    /// Role at the time the token was issued. Used for role-based access control.
    pub role: UserRole,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp): timestamp after which the token is rejected.
    pub exp: usize,
}

/// issue_token
///
/// Signs a token for `user` valid for `config.jwt_ttl_secs` seconds.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now,
        exp: now + config.jwt_ttl_secs as usize,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// verify_token
///
/// Decodes and validates a token (signature and expiration). Any failure is reported as
/// an invalid request.
pub fn verify_token(token: &str, config: &AppConfig) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = ?e.kind(), "token rejected");
        AppError::invalid_request()
    })
}

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(plain, BCRYPT_COST)?)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    Ok(bcrypt::verify(plain, hash)?)
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request, taken from the token claims.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a function argument
/// in any authenticated handler (and in the route middleware).
///
/// 1. Dependency Resolution: the JWT secret comes from AppConfig.
/// 2. Token Extraction: a missing or non-Bearer `Authorization` header is a 401.
/// 3. Token Validation: a token that does not verify is a 400 "Invalid request".
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::unauthorized("Unauthorized"))?;

        let claims = verify_token(token, &config)?;

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// AdminUser
///
/// Like `AuthUser`, but additionally requires the `ADMIN` role (403 otherwise).
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::debug!(user_id = %user.id, "admin route denied");
            return Err(AppError::forbidden());
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn admin() -> User {
        User {
            id: Uuid::new_v4(),
            role: UserRole::Admin,
            ..User::default()
        }
    }

    async fn extract_admin(token: Option<String>, config: &AppConfig) -> Result<AdminUser, AppError> {
        let mut builder = Request::builder().uri("/admin/pages");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AdminUser::from_request_parts(&mut parts, config).await
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let config = AppConfig::default();
        let user = admin();
        let token = issue_token(&user, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.exp - claims.iat, config.jwt_ttl_secs as usize);
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let config = AppConfig::default();
        let other = AppConfig {
            jwt_secret: "another-secret".to_string(),
            ..AppConfig::default()
        };
        let token = issue_token(&admin(), &other).unwrap();
        let err = verify_token(&token, &config).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("Qwerty12345").unwrap();
        assert!(verify_password("Qwerty12345", &hash).unwrap());
        assert!(!verify_password("qwerty12345", &hash).unwrap());
    }

    #[tokio::test]
    async fn admin_extractor_statuses() {
        let config = AppConfig::default();

        let missing = extract_admin(None, &config).await.unwrap_err();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let garbage = extract_admin(Some("garbage".into()), &config).await.unwrap_err();
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

        let user = User {
            id: Uuid::new_v4(),
            ..User::default()
        };
        let user_token = issue_token(&user, &config).unwrap();
        let denied = extract_admin(Some(user_token), &config).await.unwrap_err();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let admin_token = issue_token(&admin(), &config).unwrap();
        assert!(extract_admin(Some(admin_token), &config).await.is_ok());
    }
}

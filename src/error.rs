use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// FieldError
///
/// A single invalid property of a request DTO together with every rule it broke.
/// Nested properties use a dotted path (`title.en`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FieldError {
    pub property: String,
    /// Rule code → human readable message.
    pub constraints: BTreeMap<String, String>,
}

/// ErrorBody
///
/// JSON body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<FieldError>,
}

/// AppError
///
/// The single error type of the service. `Operational` errors are expected outcomes
/// (bad input, missing resource, denied access) and are reported to the client as-is.
/// Every other variant is a critical failure: it is logged and answered with a generic 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{description}")]
    Operational {
        status: StatusCode,
        description: String,
        validation_errors: Vec<FieldError>,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
    #[error("token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub const INVALID_REQUEST: &str = "Invalid request";
pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";

impl AppError {
    pub fn operational(status: StatusCode, description: impl Into<String>) -> Self {
        AppError::Operational {
            status,
            description: description.into(),
            validation_errors: Vec::new(),
        }
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, description)
    }

    pub fn invalid_request() -> Self {
        Self::bad_request(INVALID_REQUEST)
    }

    pub fn validation(validation_errors: Vec<FieldError>) -> Self {
        AppError::Operational {
            status: StatusCode::BAD_REQUEST,
            description: INVALID_REQUEST.to_string(),
            validation_errors,
        }
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, description)
    }

    pub fn unauthorized(description: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, description)
    }

    pub fn forbidden() -> Self {
        Self::operational(StatusCode::FORBIDDEN, "Forbidden")
    }

    /// HTTP status this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Operational { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Operational {
                status,
                description,
                validation_errors,
            } => {
                tracing::debug!(%status, %description, "request rejected");
                let body = ErrorBody {
                    message: description,
                    validation_errors,
                };
                (status, Json(body)).into_response()
            }
            critical => {
                tracing::error!(error = %critical, "unhandled error");
                let body = ErrorBody {
                    message: INTERNAL_SERVER_ERROR.to_string(),
                    validation_errors: Vec::new(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

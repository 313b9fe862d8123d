use std::{borrow::Cow, collections::BTreeMap};

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{AppError, FieldError};

// --- Custom Rules ---

/// Rejects values containing a space (passwords).
pub fn no_spaces(value: &str) -> Result<(), ValidationError> {
    if value.contains(' ') {
        return Err(ValidationError::new("notContains")
            .with_message(Cow::Borrowed("password must not contain a space")));
    }
    Ok(())
}

/// Slug pattern `^[a-z][a-z0-9-]*$`.
pub fn valid_slug(value: &str) -> Result<(), ValidationError> {
    let mut chars = value.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_allowed = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if starts_with_letter && rest_allowed {
        Ok(())
    } else {
        Err(ValidationError::new("matches").with_message(Cow::Borrowed(
            "urlSlug must match /^[a-z][a-z0-9-]*$/ regular expression",
        )))
    }
}

// --- Input Normalization (applied while deserializing) ---

pub fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

pub fn lowercase_trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| s.trim().to_lowercase())
}

pub fn opt_trimmed<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|s| s.map(|s| s.trim().to_string()))
}

pub fn opt_lowercase_trimmed<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|s| s.map(|s| s.trim().to_lowercase()))
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`, via `default`).
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// --- Error Conversion ---

/// Flattens validator output into the `validationErrors` list of the error body.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out
}

/// Request DTOs are `rename_all = "camelCase"`; report the name the client sent.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let field = camel_case(field);
        let property = if prefix.is_empty() {
            field
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                let constraints: BTreeMap<String, String> = list
                    .iter()
                    .map(|e| {
                        let message = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{property} is invalid ({})", e.code));
                        (e.code.to_string(), message)
                    })
                    .collect();
                out.push(FieldError {
                    property,
                    constraints,
                });
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &property, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{property}.{index}"), out);
                }
            }
        }
    }
    out.sort_by(|a, b| a.property.cmp(&b.property));
}

/// Runs the DTO's declarative rules, turning failures into a 400 `AppError`.
pub fn validate_dto<T: Validate>(dto: &T) -> Result<(), AppError> {
    dto.validate()
        .map_err(|errors| AppError::validation(field_errors(&errors)))
}

/// Parses a path id. Anything that is not a UUID is an invalid request.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::invalid_request())
}

// --- Extractors ---

/// ValidatedJson
///
/// JSON body extractor that rejects malformed bodies with 400 "Invalid request" and then
/// runs the DTO's validation rules before the handler executes.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(error = %rejection, "malformed json body");
            AppError::invalid_request()
        })?;
        validate_dto(&value)?;
        Ok(ValidatedJson(value))
    }
}

/// ValidatedQuery
///
/// Query string counterpart of `ValidatedJson`.
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection, "malformed query string");
                AppError::invalid_request()
            })?;
        validate_dto(&value)?;
        Ok(ValidatedQuery(value))
    }
}

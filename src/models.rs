use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{
    deserialize_some, lowercase_trimmed, no_spaces, opt_lowercase_trimmed, opt_trimmed, trimmed,
    valid_slug,
};

// --- Shared Enums ---

/// UserRole
///
/// The RBAC field carried both in the `user` table and in the JWT `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "USER" => Ok(UserRole::User),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

/// PageType
///
/// Front-end rendering template of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    #[default]
    Template,
    Home,
    Contacts,
    Blog,
    Article,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Template => "template",
            PageType::Home => "home",
            PageType::Contacts => "contacts",
            PageType::Blog => "blog",
            PageType::Article => "article",
        }
    }
}

impl TryFrom<String> for PageType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "template" => Ok(PageType::Template),
            "home" => Ok(PageType::Home),
            "contacts" => Ok(PageType::Contacts),
            "blog" => Ok(PageType::Blog),
            "article" => Ok(PageType::Article),
            other => Err(format!("unknown page type: {other}")),
        }
    }
}

/// MultiLang
///
/// One string per supported language. Stored as JSONB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct MultiLang {
    pub en: String,
    pub uk: String,
    pub ru: String,
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `user` table. `password` holds the bcrypt hash and never leaves the service;
/// responses go through `UserDto`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub is_active: bool,
}

/// Page
///
/// A node of the page tree. `parent_id` is the edge; `nsleft`/`nsright` are the
/// nested-set bounds maintained by the repository.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: MultiLang,
    pub url_slug: String,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<MultiLang>,
    pub sort: f64,
    pub page_type: PageType,
    pub is_active: bool,
    pub images: Vec<String>,
    pub parent_id: Option<Uuid>,
    pub nsleft: i32,
    pub nsright: i32,
}

impl Page {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// True when `other` lies strictly inside this page's subtree.
    pub fn is_ancestor_of(&self, other: &Page) -> bool {
        other.nsleft > self.nsleft && other.nsright < self.nsright
    }
}

// --- Auth Payloads ---

/// LoginRequest
///
/// Input payload for `POST /public/auth/login` and `POST /admin/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email(message = "email must be an email"))]
    #[serde(deserialize_with = "lowercase_trimmed")]
    pub email: String,
    #[validate(
        length(min = 4, max = 100, message = "password must be between 4 and 100 characters"),
        custom(function = "no_spaces")
    )]
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for the public self-registration endpoint. Accounts created this way
/// always get the `USER` role and start active.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    #[serde(deserialize_with = "trimmed")]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    #[serde(deserialize_with = "trimmed")]
    pub last_name: String,
    #[validate(email(message = "email must be an email"))]
    #[serde(deserialize_with = "lowercase_trimmed")]
    pub email: String,
    #[validate(
        length(min = 4, max = 100, message = "password must be between 4 and 100 characters"),
        custom(function = "no_spaces")
    )]
    pub password: String,
}

/// TokenResponse
///
/// Output of login and registration: the signed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

// --- User Payloads ---

/// CreateUserRequest
///
/// Input payload for `POST /admin/users`. The role is not accepted here: accounts created
/// by an administrator are regular users.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    #[serde(deserialize_with = "trimmed")]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    #[serde(deserialize_with = "trimmed")]
    pub last_name: String,
    #[validate(email(message = "email must be an email"))]
    #[serde(deserialize_with = "lowercase_trimmed")]
    pub email: String,
    #[validate(
        length(min = 4, max = 100, message = "password must be between 4 and 100 characters"),
        custom(function = "no_spaces")
    )]
    pub password: String,
    pub is_active: bool,
}

/// UpdateUserRequest
///
/// Partial update payload for `PATCH /admin/users/{id}` and `PATCH /public/auth/update-user`.
/// `is_active` is ignored on the self-service route.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "opt_trimmed", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "opt_trimmed", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_lowercase_trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(email(message = "email must be an email"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 4, max = 100, message = "password must be between 4 and 100 characters"),
        custom(function = "no_spaces")
    )]
    pub password: Option<String>,
}

/// UserFilters
///
/// Column filters of the admin user search; text filters are case-insensitive "contains".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 4, max = 20))]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 4, max = 20))]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "email must be an email"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// UserSort
///
/// Requested ordering, applied in field order (first name, last name, email).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserSort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<SortDirection>,
}

impl UserSort {
    /// (column, direction) pairs that were requested, in application order.
    pub fn columns(&self) -> Vec<(&'static str, SortDirection)> {
        [
            ("first_name", self.first_name),
            ("last_name", self.last_name),
            ("email", self.email),
        ]
        .into_iter()
        .filter_map(|(column, direction)| direction.map(|d| (column, d)))
        .collect()
    }
}

/// FindUsersRequest
///
/// Input payload for `POST /admin/users/find`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FindUsersRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub filters: Option<UserFilters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<UserSort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[validate(range(min = 1, message = "page must be a positive number"))]
    #[ts(type = "number")]
    pub page: i64,
    #[validate(range(min = 1, message = "perPage must be a positive number"))]
    #[ts(type = "number")]
    pub per_page: i64,
}

/// UserDto
///
/// Public representation of a user (no password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
}

/// FindUsersResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FindUsersResponse {
    pub data: Vec<UserDto>,
    #[ts(type = "number")]
    pub page: i64,
    #[ts(type = "number")]
    pub per_page: i64,
    #[ts(type = "number")]
    pub total_pages: i64,
}

// --- Page Payloads ---

/// CreatePageRequest
///
/// Input payload for `POST /admin/pages`. The slug is lowercased and trimmed before
/// validation; a colliding slug is made unique by the service.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageRequest {
    #[validate(nested)]
    pub title: MultiLang,
    #[serde(deserialize_with = "lowercase_trimmed")]
    #[validate(
        length(min = 2, max = 40, message = "urlSlug must be between 2 and 40 characters"),
        custom(function = "valid_slug")
    )]
    pub url_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub content: Option<MultiLang>,
    pub sort: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_type: Option<PageType>,
}

/// UpdatePageRequest
///
/// Partial update payload for `PATCH /admin/pages/{id}`.
/// `parentId` is tri-state: absent keeps the parent, `null` detaches the page to the root,
/// an id moves it under that page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub title: Option<MultiLang>,
    #[serde(
        default,
        deserialize_with = "opt_lowercase_trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(
        length(min = 2, max = 40, message = "urlSlug must be between 2 and 40 characters"),
        custom(function = "valid_slug")
    )]
    pub url_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub content: Option<MultiLang>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>, format = Uuid)]
    #[ts(type = "string | null")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_type: Option<PageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// ImageDto
///
/// A stored image: its filename and the public URL it is served from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ImageDto {
    pub id: String,
    pub url: String,
}

/// PageDto
///
/// Full page representation. `parent` is shallow (no parent/children of its own);
/// `children` is as deep as the loaded tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PageDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: MultiLang,
    pub url_slug: String,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<MultiLang>,
    pub sort: f64,
    #[schema(no_recursion)]
    pub parent: Option<Box<PageDto>>,
    #[schema(no_recursion)]
    pub children: Vec<PageDto>,
    pub is_active: bool,
    pub page_type: PageType,
    pub images: Vec<ImageDto>,
}

/// RoutesDto
///
/// Navigation projection of the public page tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RoutesDto {
    pub id: Uuid,
    pub title: MultiLang,
    pub url_slug: String,
    pub sort: f64,
    pub page_type: PageType,
    #[schema(no_recursion)]
    pub parent: Option<Box<RoutesDto>>,
    #[schema(no_recursion)]
    pub children: Vec<RoutesDto>,
}

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;

/// ChildrenQuery
///
/// Query parameters of `GET /public/pages/{slug}/children`.
#[derive(Debug, Clone, Deserialize, IntoParams, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct ChildrenQuery {
    /// 1-based page number (default 1).
    #[validate(range(min = 1, message = "page must be a positive number"))]
    pub page: Option<i64>,
    /// Page size (default 10).
    #[validate(range(min = 1, message = "perPage must be a positive number"))]
    pub per_page: Option<i64>,
}

/// PageChildrenResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PageChildrenResponse {
    pub data: Vec<PageDto>,
    #[ts(type = "number")]
    pub page: i64,
    #[ts(type = "number")]
    pub per_page: i64,
    #[ts(type = "number")]
    pub total_pages: i64,
}

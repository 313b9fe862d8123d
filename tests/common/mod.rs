#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use cms_backend::{
    AppConfig, AppState,
    auth::{hash_password, issue_token},
    create_router,
    models::{FindUsersRequest, MultiLang, Page, SortDirection, User, UserRole},
    repository::{NewPage, NewUser, PageUpdate, Repository, RepositoryState, UserChanges},
    storage::{MockStorageService, StorageState},
    tree::{assign_bounds, offset, sibling_order},
};
use serde_json::Value;
use sqlx::error::{DatabaseError, ErrorKind};
use std::{
    borrow::Cow,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@admin.com";
pub const ADMIN_PASSWORD: &str = "Qwerty12345";

/// InMemoryRepository
///
/// Vector-backed `Repository` for router tests. Tree bounds are recomputed after every
/// page mutation, so `nsleft`/`nsright` behave like the Postgres implementation.
#[derive(Default)]
pub struct InMemoryRepository {
    users: Mutex<Vec<User>>,
    pages: Mutex<Vec<Page>>,
    // While non-zero, `slug_exists` answers "free" as if another request had not
    // committed yet. The unique slug constraint still applies on write.
    stale_slug_checks: AtomicUsize,
}

impl InMemoryRepository {
    /// Makes the next `count` slug checks miss existing pages.
    pub fn miss_slug_checks(&self, count: usize) {
        self.stale_slug_checks.store(count, Ordering::SeqCst);
    }

    pub fn pages(&self) -> Vec<Page> {
        let mut pages = self.pages.lock().unwrap().clone();
        pages.sort_by_key(|p| p.nsleft);
        pages
    }

    pub fn users(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }
}

fn renumber(pages: &mut [Page]) {
    let bounds = assign_bounds(pages);
    for (id, left, right) in bounds {
        if let Some(page) = pages.iter_mut().find(|p| p.id == id) {
            page.nsleft = left;
            page.nsright = right;
        }
    }
}

/// Stand-in for the error Postgres raises on `page_url_slug_unique`.
#[derive(Debug)]
struct UniqueViolation(&'static str);

impl std::fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.0)
    }
}

impl std::error::Error for UniqueViolation {}

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.0)
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

fn slug_taken(pages: &[Page], slug: &str, exclude: Option<Uuid>) -> bool {
    pages.iter().any(|p| p.url_slug == slug && Some(p.id) != exclude)
}

fn unique_violation() -> sqlx::Error {
    sqlx::Error::Database(Box::new(UniqueViolation("page_url_slug_unique")))
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user_by_id(&self, id: Uuid) -> sqlx::Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> sqlx::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_users(&self, req: &FindUsersRequest) -> sqlx::Result<(Vec<User>, i64)> {
        let mut matches: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| match req.search.as_deref() {
                Some(s) => {
                    contains_ci(&u.first_name, s)
                        || contains_ci(&u.last_name, s)
                        || contains_ci(&u.email, s)
                }
                None => true,
            })
            .filter(|u| match &req.filters {
                Some(f) => {
                    f.first_name.as_deref().is_none_or(|v| contains_ci(&u.first_name, v))
                        && f.last_name.as_deref().is_none_or(|v| contains_ci(&u.last_name, v))
                        && f.email.as_deref().is_none_or(|v| contains_ci(&u.email, v))
                        && f.is_active.is_none_or(|v| u.is_active == v)
                }
                None => true,
            })
            .cloned()
            .collect();

        let order = req.sort.as_ref().map(|s| s.columns()).unwrap_or_default();
        if order.is_empty() {
            matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        } else {
            matches.sort_by(|a, b| {
                order
                    .iter()
                    .map(|(column, direction)| {
                        let ord = match *column {
                            "first_name" => a.first_name.cmp(&b.first_name),
                            "last_name" => a.last_name.cmp(&b.last_name),
                            _ => a.email.cmp(&b.email),
                        };
                        match direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    })
                    .fold(std::cmp::Ordering::Equal, |acc, o| acc.then(o))
            });
        }

        let total = matches.len() as i64;
        let data = matches
            .into_iter()
            .skip(offset(req.page, req.per_page) as usize)
            .take(req.per_page as usize)
            .collect();
        Ok((data, total))
    }

    async fn insert_user(&self, user: NewUser) -> sqlx::Result<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password: user.password_hash,
            role: user.role,
            is_active: user.is_active,
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> sqlx::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.first_name {
            user.first_name = v;
        }
        if let Some(v) = changes.last_name {
            user.last_name = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.password_hash {
            user.password = v;
        }
        if let Some(v) = changes.is_active {
            user.is_active = v;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> sqlx::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let position = users.iter().position(|u| u.id == id);
        Ok(position.map(|i| users.remove(i)))
    }

    async fn list_pages(&self) -> sqlx::Result<Vec<Page>> {
        Ok(self.pages())
    }

    async fn find_page_by_id(&self, id: Uuid) -> sqlx::Result<Option<Page>> {
        Ok(self.pages.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn find_page_by_slug(&self, slug: &str) -> sqlx::Result<Option<Page>> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.url_slug == slug)
            .cloned())
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> sqlx::Result<bool> {
        let stale = self
            .stale_slug_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(false);
        }
        Ok(slug_taken(&self.pages.lock().unwrap(), slug, exclude))
    }

    async fn list_children(&self, parent_id: Uuid, only_active: bool) -> sqlx::Result<Vec<Page>> {
        let mut children: Vec<Page> = self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.parent_id == Some(parent_id) && (!only_active || p.is_active))
            .cloned()
            .collect();
        children.sort_by(sibling_order);
        Ok(children)
    }

    async fn active_children_page(
        &self,
        parent_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> sqlx::Result<(Vec<Page>, i64)> {
        let children = self.list_children(parent_id, true).await?;
        let total = children.len() as i64;
        Ok((
            children
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
            total,
        ))
    }

    async fn has_inactive_ancestor(&self, page: &Page) -> sqlx::Result<bool> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.is_ancestor_of(page) && !p.is_active))
    }

    async fn insert_page(&self, page: NewPage) -> sqlx::Result<Page> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut pages = self.pages.lock().unwrap();
        if slug_taken(&pages, &page.url_slug, None) {
            return Err(unique_violation());
        }
        pages.push(Page {
            id,
            created_at: now,
            updated_at: now,
            title: page.title,
            url_slug: page.url_slug,
            published_at: page.published_at,
            content: page.content,
            sort: page.sort,
            page_type: page.page_type,
            is_active: page.is_active,
            images: page.images,
            parent_id: page.parent_id,
            // Appended after existing siblings with the same sort key.
            nsleft: i32::MAX,
            nsright: i32::MAX,
        });
        renumber(&mut pages);
        Ok(pages.iter().find(|p| p.id == id).cloned().unwrap())
    }

    async fn update_page(&self, page: &Page, reparent: bool) -> sqlx::Result<PageUpdate> {
        let mut pages = self.pages.lock().unwrap();
        let Some(current) = pages.iter().find(|p| p.id == page.id).cloned() else {
            return Ok(PageUpdate::NotFound);
        };
        if reparent {
            if let Some(parent_id) = page.parent_id {
                let Some(parent) = pages.iter().find(|p| p.id == parent_id) else {
                    return Ok(PageUpdate::ParentNotFound);
                };
                if parent.id == current.id || current.is_ancestor_of(parent) {
                    return Ok(PageUpdate::Cycle);
                }
            }
        }
        if slug_taken(&pages, &page.url_slug, Some(page.id)) {
            return Err(unique_violation());
        }

        if let Some(stored) = pages.iter_mut().find(|p| p.id == page.id) {
            *stored = Page {
                updated_at: Utc::now(),
                parent_id: if reparent { page.parent_id } else { current.parent_id },
                nsleft: current.nsleft,
                nsright: current.nsright,
                ..page.clone()
            };
        }
        if reparent {
            renumber(&mut pages);
        }
        Ok(pages
            .iter()
            .find(|p| p.id == page.id)
            .cloned()
            .map_or(PageUpdate::NotFound, PageUpdate::Saved))
    }

    async fn delete_page(&self, id: Uuid) -> sqlx::Result<Option<Page>> {
        let mut pages = self.pages.lock().unwrap();
        let Some(target) = pages.iter().find(|p| p.id == id).cloned() else {
            return Ok(None);
        };
        pages.retain(|p| p.id != target.id && !target.is_ancestor_of(p));
        renumber(&mut pages);
        Ok(Some(target))
    }
}

// --- App Harness ---

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_storage(MockStorageService::new())
    }

    pub fn with_storage(storage: MockStorageService) -> Self {
        let repo = Arc::new(InMemoryRepository::default());
        let config = AppConfig::default();
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: Arc::new(storage.clone()) as StorageState,
            config: config.clone(),
        };
        Self {
            router: create_router(state),
            repo,
            storage,
            config,
        }
    }

    /// Inserts a user directly and returns a token for it.
    pub async fn seed_user(&self, email: &str, role: UserRole) -> (User, String) {
        let user = self
            .repo
            .insert_user(NewUser {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: email.to_string(),
                password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
                role,
                is_active: true,
            })
            .await
            .unwrap();
        let token = issue_token(&user, &self.config).unwrap();
        (user, token)
    }

    pub async fn admin_token(&self) -> String {
        self.seed_user(ADMIN_EMAIL, UserRole::Admin).await.1
    }

    /// Sends a request through the router; returns the status and the parsed JSON body
    /// (`Value::Null` for an empty or non-JSON body).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Creates a page through the admin API and returns its JSON.
    pub async fn create_page(
        &self,
        token: &str,
        slug: &str,
        parent: Option<&str>,
        sort: f64,
        is_active: Option<bool>,
    ) -> Value {
        let mut body = serde_json::json!({
            "title": title(slug),
            "urlSlug": slug,
            "sort": sort,
        });
        if let Some(parent) = parent {
            body["parentId"] = Value::String(parent.to_string());
        }
        if let Some(active) = is_active {
            body["isActive"] = Value::Bool(active);
        }
        let (status, json) = self.send("POST", "/admin/pages", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create page failed: {json}");
        json
    }
}

pub fn title(text: &str) -> MultiLang {
    MultiLang {
        en: text.to_string(),
        uk: text.to_string(),
        ru: text.to_string(),
    }
}

use crate::{
    models::{FindUsersRequest, MultiLang, Page, PageType, User, UserRole},
    tree::assign_bounds,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction, query_builder::QueryBuilder, types::Json};
use std::sync::Arc;
use uuid::Uuid;

/// NewUser
///
/// Insert payload for the `user` table. `password_hash` is already bcrypt-hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
}

/// UserChanges
///
/// Partial update of a user. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}

/// NewPage
///
/// Insert payload for the `page` table. The repository assigns the tree bounds.
#[derive(Debug, Clone)]
pub struct NewPage {
    pub title: MultiLang,
    pub url_slug: String,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<MultiLang>,
    pub sort: f64,
    pub page_type: PageType,
    pub is_active: bool,
    pub images: Vec<String>,
    pub parent_id: Option<Uuid>,
}

/// PageUpdate
///
/// Result of `Repository::update_page`. The move target is re-checked while the tree is
/// locked, so a concurrent move or delete is reported instead of corrupting the bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum PageUpdate {
    Saved(Page),
    NotFound,
    ParentNotFound,
    /// The new parent is the page itself or one of its descendants.
    Cycle,
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. Handlers and services
/// only see this trait, so tests can swap the Postgres implementation for an in-memory one.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user_by_id(&self, id: Uuid) -> sqlx::Result<Option<User>>;
    // Expects an already normalized (lowercased, trimmed) email.
    async fn find_user_by_email(&self, email: &str) -> sqlx::Result<Option<User>>;
    // One page of matching users plus the total number of matches.
    async fn find_users(&self, req: &FindUsersRequest) -> sqlx::Result<(Vec<User>, i64)>;
    async fn insert_user(&self, user: NewUser) -> sqlx::Result<User>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> sqlx::Result<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> sqlx::Result<Option<User>>;

    // --- Pages ---
    // Every page in tree (nsleft) order.
    async fn list_pages(&self) -> sqlx::Result<Vec<Page>>;
    async fn find_page_by_id(&self, id: Uuid) -> sqlx::Result<Option<Page>>;
    async fn find_page_by_slug(&self, slug: &str) -> sqlx::Result<Option<Page>>;
    // True when another page (not `exclude`) already uses `slug`.
    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> sqlx::Result<bool>;
    // Direct children in sibling order.
    async fn list_children(&self, parent_id: Uuid, only_active: bool) -> sqlx::Result<Vec<Page>>;
    // One page of active direct children plus their total count.
    async fn active_children_page(
        &self,
        parent_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> sqlx::Result<(Vec<Page>, i64)>;
    async fn has_inactive_ancestor(&self, page: &Page) -> sqlx::Result<bool>;

    /// Inserts the page as the last child of its parent (or as the last root).
    async fn insert_page(&self, page: NewPage) -> sqlx::Result<Page>;
    /// Persists the page's editable fields. `parent_id` is only written with `reparent`;
    /// the move is then validated under the tree lock and the bounds are rebuilt.
    async fn update_page(&self, page: &Page, reparent: bool) -> sqlx::Result<PageUpdate>;
    /// Deletes the page with its whole subtree and returns the removed page.
    async fn delete_page(&self, id: Uuid) -> sqlx::Result<Option<Page>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, created_at, updated_at, first_name, last_name, email, password, role, is_active";

const PAGE_COLUMNS: &str = "id, created_at, updated_at, title, url_slug, published_at, content, \
     sort, page_type, is_active, images, parent_id, nsleft, nsright";

// Serializes every nested-set mutation for the duration of its transaction.
const TREE_LOCK_KEY: i64 = 0x7061_6765;

/// PageRow
///
/// Raw `page` row: multilingual columns are JSONB.
#[derive(FromRow)]
struct PageRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    title: Json<MultiLang>,
    url_slug: String,
    published_at: Option<DateTime<Utc>>,
    content: Option<Json<MultiLang>>,
    sort: f64,
    #[sqlx(try_from = "String")]
    page_type: PageType,
    is_active: bool,
    images: Vec<String>,
    parent_id: Option<Uuid>,
    nsleft: i32,
    nsright: i32,
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Page {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            title: row.title.0,
            url_slug: row.url_slug,
            published_at: row.published_at,
            content: row.content.map(|c| c.0),
            sort: row.sort,
            page_type: row.page_type,
            is_active: row.is_active,
            images: row.images,
            parent_id: row.parent_id,
            nsleft: row.nsleft,
            nsright: row.nsright,
        }
    }
}

/// Shape of a tree row needed to renumber the forest.
#[derive(FromRow)]
struct TreeRow {
    id: Uuid,
    parent_id: Option<Uuid>,
    sort: f64,
    nsleft: i32,
}

async fn fetch_page(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> sqlx::Result<Option<Page>> {
    let row = sqlx::query_as::<_, PageRow>(&format!(
        "SELECT {PAGE_COLUMNS} FROM page WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(Page::from))
}

async fn lock_tree(tx: &mut Transaction<'_, Postgres>) -> sqlx::Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(TREE_LOCK_KEY)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// rebuild_bounds
///
/// Renumbers the whole forest from the parent references. Used after a move, where
/// shifting ranges in place would have to juggle two overlapping intervals.
async fn rebuild_bounds(tx: &mut Transaction<'_, Postgres>) -> sqlx::Result<()> {
    let rows = sqlx::query_as::<_, TreeRow>("SELECT id, parent_id, sort, nsleft FROM page")
        .fetch_all(&mut **tx)
        .await?;

    let pages: Vec<Page> = rows
        .into_iter()
        .map(|row| Page {
            id: row.id,
            parent_id: row.parent_id,
            sort: row.sort,
            nsleft: row.nsleft,
            ..Page::default()
        })
        .collect();

    let bounds = assign_bounds(&pages);
    let ids: Vec<Uuid> = bounds.iter().map(|(id, _, _)| *id).collect();
    let lefts: Vec<i32> = bounds.iter().map(|(_, l, _)| *l).collect();
    let rights: Vec<i32> = bounds.iter().map(|(_, _, r)| *r).collect();

    sqlx::query(
        r#"
        UPDATE page
        SET nsleft = b.l, nsright = b.r
        FROM UNNEST($1::uuid[], $2::int[], $3::int[]) AS b(id, l, r)
        WHERE page.id = b.id
        "#,
    )
    .bind(ids)
    .bind(lefts)
    .bind(rights)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Appends the WHERE conditions of the admin user search (shared by count and data queries).
fn push_user_conditions(builder: &mut QueryBuilder<'_, Postgres>, req: &FindUsersRequest) {
    if let Some(search) = req.search.as_ref().filter(|s| !s.trim().is_empty()) {
        // Case-insensitive search across both names and the email.
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR last_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(filters) = &req.filters {
        let text_filters = [
            ("first_name", &filters.first_name),
            ("last_name", &filters.last_name),
            ("email", &filters.email),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value {
                builder.push(format!(" AND {} ILIKE ", column));
                builder.push_bind(format!("%{}%", value));
            }
        }
        if let Some(is_active) = filters.is_active {
            builder.push(" AND is_active = ");
            builder.push_bind(is_active);
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_id(&self, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM \"user\" WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM \"user\" WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// find_users
    ///
    /// Flexible search/filtering built with QueryBuilder so every user-supplied value is
    /// bound as a parameter. Sort columns come from a fixed whitelist (`UserSort::columns`).
    async fn find_users(&self, req: &FindUsersRequest) -> sqlx::Result<(Vec<User>, i64)> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM \"user\" WHERE 1 = 1");
        push_user_conditions(&mut count, req);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM \"user\" WHERE 1 = 1"));
        push_user_conditions(&mut builder, req);

        let order = req.sort.as_ref().map(|s| s.columns()).unwrap_or_default();
        if order.is_empty() {
            builder.push(" ORDER BY created_at DESC");
        } else {
            let clauses: Vec<String> = order
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction.as_sql()))
                .collect();
            builder.push(format!(" ORDER BY {}", clauses.join(", ")));
        }

        builder.push(" LIMIT ");
        builder.push_bind(req.per_page);
        builder.push(" OFFSET ");
        builder.push_bind(crate::tree::offset(req.page, req.per_page));

        let users = builder.build_query_as::<User>().fetch_all(&self.pool).await?;
        Ok((users, total))
    }

    async fn insert_user(&self, user: NewUser) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO "user" (first_name, last_name, email, password, role, is_active)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_one(&self.pool)
        .await
    }

    /// update_user
    ///
    /// Uses `COALESCE` to handle `Option<T>` fields: a column is only written when the
    /// corresponding change is `Some`.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE "user"
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   email = COALESCE($4, email),
                   password = COALESCE($5, password),
                   is_active = COALESCE($6, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_user(&self, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "DELETE FROM \"user\" WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_pages(&self) -> sqlx::Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM page ORDER BY nsleft ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }

    async fn find_page_by_id(&self, id: Uuid) -> sqlx::Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM page WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Page::from))
    }

    async fn find_page_by_slug(&self, slug: &str) -> sqlx::Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM page WHERE url_slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Page::from))
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM page WHERE url_slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_children(&self, parent_id: Uuid, only_active: bool) -> sqlx::Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            r#"SELECT {PAGE_COLUMNS} FROM page
               WHERE parent_id = $1 AND ($2 = false OR is_active = true)
               ORDER BY sort ASC, nsleft ASC"#
        ))
        .bind(parent_id)
        .bind(only_active)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }

    async fn active_children_page(
        &self,
        parent_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> sqlx::Result<(Vec<Page>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM page WHERE parent_id = $1 AND is_active = true",
        )
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PageRow>(&format!(
            r#"SELECT {PAGE_COLUMNS} FROM page
               WHERE parent_id = $1 AND is_active = true
               ORDER BY sort ASC, nsleft ASC
               LIMIT $2 OFFSET $3"#
        ))
        .bind(parent_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Page::from).collect(), total))
    }

    /// has_inactive_ancestor
    ///
    /// Ancestors are exactly the rows whose bounds enclose the page's bounds.
    async fn has_inactive_ancestor(&self, page: &Page) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM page WHERE nsleft < $1 AND nsright > $2 AND is_active = false)",
        )
        .bind(page.nsleft)
        .bind(page.nsright)
        .fetch_one(&self.pool)
        .await
    }

    /// insert_page
    ///
    /// Opens a gap of two at the parent's right bound (or after the last root) and places
    /// the new node there, all inside one locked transaction.
    async fn insert_page(&self, page: NewPage) -> sqlx::Result<Page> {
        let mut tx = self.pool.begin().await?;
        lock_tree(&mut tx).await?;

        let left = match page.parent_id {
            Some(parent_id) => {
                let parent_right =
                    sqlx::query_scalar::<_, i32>("SELECT nsright FROM page WHERE id = $1")
                        .bind(parent_id)
                        .fetch_one(&mut *tx)
                        .await?;

                sqlx::query("UPDATE page SET nsright = nsright + 2 WHERE nsright >= $1")
                    .bind(parent_right)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE page SET nsleft = nsleft + 2 WHERE nsleft > $1")
                    .bind(parent_right)
                    .execute(&mut *tx)
                    .await?;

                parent_right
            }
            None => {
                let max_right =
                    sqlx::query_scalar::<_, i32>("SELECT COALESCE(MAX(nsright), 0) FROM page")
                        .fetch_one(&mut *tx)
                        .await?;
                max_right + 1
            }
        };

        let row = sqlx::query_as::<_, PageRow>(&format!(
            r#"INSERT INTO page
                   (title, url_slug, published_at, content, sort, page_type, is_active, images,
                    parent_id, nsleft, nsright)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING {PAGE_COLUMNS}"#
        ))
        .bind(Json(page.title))
        .bind(page.url_slug)
        .bind(page.published_at)
        .bind(page.content.map(Json))
        .bind(page.sort)
        .bind(page.page_type.as_str())
        .bind(page.is_active)
        .bind(page.images)
        .bind(page.parent_id)
        .bind(left)
        .bind(left + 1)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// update_page
    ///
    /// Moves take the tree lock, then re-read the page and its new parent so the cycle
    /// check runs against bounds no other writer can change before the commit.
    async fn update_page(&self, page: &Page, reparent: bool) -> sqlx::Result<PageUpdate> {
        let mut tx = self.pool.begin().await?;
        if reparent {
            lock_tree(&mut tx).await?;

            let Some(current) = fetch_page(&mut tx, page.id).await? else {
                return Ok(PageUpdate::NotFound);
            };
            if let Some(parent_id) = page.parent_id {
                let Some(parent) = fetch_page(&mut tx, parent_id).await? else {
                    return Ok(PageUpdate::ParentNotFound);
                };
                if parent.id == current.id || current.is_ancestor_of(&parent) {
                    return Ok(PageUpdate::Cycle);
                }
            }
        }

        let updated = sqlx::query(
            r#"UPDATE page
               SET title = $2, url_slug = $3, published_at = $4, content = $5, sort = $6,
                   page_type = $7, is_active = $8, images = $9,
                   parent_id = CASE WHEN $11 THEN $10 ELSE parent_id END,
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(page.id)
        .bind(Json(&page.title))
        .bind(&page.url_slug)
        .bind(page.published_at)
        .bind(page.content.as_ref().map(Json))
        .bind(page.sort)
        .bind(page.page_type.as_str())
        .bind(page.is_active)
        .bind(&page.images)
        .bind(page.parent_id)
        .bind(reparent)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(PageUpdate::NotFound);
        }

        if reparent {
            rebuild_bounds(&mut tx).await?;
        }

        let saved = fetch_page(&mut tx, page.id).await?;
        tx.commit().await?;
        Ok(saved.map_or(PageUpdate::NotFound, PageUpdate::Saved))
    }

    /// delete_page
    ///
    /// Removes every row inside the page's bounds, then closes the gap they leave.
    async fn delete_page(&self, id: Uuid) -> sqlx::Result<Option<Page>> {
        let mut tx = self.pool.begin().await?;
        lock_tree(&mut tx).await?;

        let Some(page) = fetch_page(&mut tx, id).await? else {
            return Ok(None);
        };
        let width = page.nsright - page.nsleft + 1;

        sqlx::query("DELETE FROM page WHERE nsleft >= $1 AND nsright <= $2")
            .bind(page.nsleft)
            .bind(page.nsright)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE page SET nsleft = nsleft - $1 WHERE nsleft > $2")
            .bind(width)
            .bind(page.nsright)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE page SET nsright = nsright - $1 WHERE nsright > $2")
            .bind(width)
            .bind(page.nsright)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(page))
    }
}

use std::collections::HashMap;

use axum::http::StatusCode;
use uuid::Uuid;

use crate::{
    error::AppError,
    mappers::{page_dto, page_with_relations, routes_from_forest},
    models::{
        ChildrenQuery, CreatePageRequest, DEFAULT_PAGE, DEFAULT_PER_PAGE, Page,
        PageChildrenResponse, PageDto, RoutesDto, UpdatePageRequest,
    },
    repository::{NewPage, PageUpdate, Repository},
    services::is_unique_violation,
    tree::{build_forest, filter_active, offset, sibling_order, total_pages},
};

fn page_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("Page with such id ({}) does not exist", id))
}

fn slug_not_found(slug: &str) -> AppError {
    AppError::not_found(format!("Page with such slug: ({}) does not exist", slug))
}

fn parent_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("Parent page with such id ({}) does not exist", id))
}

fn move_cycle() -> AppError {
    AppError::operational(
        StatusCode::BAD_REQUEST,
        "Page can not be moved under itself or its descendant",
    )
}

/// Writes racing for the same slug are retried with a freshly resolved slug this many times.
const SLUG_ATTEMPTS: usize = 3;

/// A slug still colliding after every retry is reported as taken, not as a server error.
fn slug_write_error(err: sqlx::Error, slug: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::bad_request(format!("Page with such slug: ({}) already exists", slug))
    } else {
        AppError::Database(err)
    }
}

/// unique_slug
///
/// Appends `-1` until no other page (ignoring `exclude`) uses the slug.
pub async fn unique_slug(
    repo: &dyn Repository,
    slug: &str,
    exclude: Option<Uuid>,
) -> Result<String, AppError> {
    let mut candidate = slug.to_string();
    while repo.slug_exists(&candidate, exclude).await? {
        candidate.push_str("-1");
    }
    if candidate != slug {
        tracing::debug!(requested = %slug, stored = %candidate, "slug collision resolved");
    }
    Ok(candidate)
}

pub async fn check_page_exists(repo: &dyn Repository, id: Uuid) -> Result<Page, AppError> {
    repo.find_page_by_id(id)
        .await?
        .ok_or_else(|| page_not_found(id))
}

async fn find_parent(repo: &dyn Repository, id: Uuid) -> Result<Page, AppError> {
    repo.find_page_by_id(id)
        .await?
        .ok_or_else(|| parent_not_found(id))
}

/// A page is publicly visible when it and every ancestor are active.
async fn find_visible(repo: &dyn Repository, slug: &str) -> Result<Page, AppError> {
    let page = repo
        .find_page_by_slug(slug)
        .await?
        .ok_or_else(|| slug_not_found(slug))?;

    if !page.is_active || repo.has_inactive_ancestor(&page).await? {
        return Err(slug_not_found(slug));
    }
    Ok(page)
}

async fn with_relations(
    repo: &dyn Repository,
    page: &Page,
    only_active_children: bool,
    base_url: &str,
) -> Result<PageDto, AppError> {
    let parent = match page.parent_id {
        Some(parent_id) => repo.find_page_by_id(parent_id).await?,
        None => None,
    };
    let children = repo.list_children(page.id, only_active_children).await?;
    Ok(page_with_relations(page, parent.as_ref(), &children, base_url))
}

/// list_pages
///
/// Every page in tree order, each with its direct parent and direct children.
pub async fn list_pages(repo: &dyn Repository, base_url: &str) -> Result<Vec<PageDto>, AppError> {
    let pages = repo.list_pages().await?;

    let by_id: HashMap<Uuid, &Page> = pages.iter().map(|p| (p.id, p)).collect();
    let mut children: HashMap<Uuid, Vec<Page>> = HashMap::new();
    for page in &pages {
        if let Some(parent_id) = page.parent_id {
            children.entry(parent_id).or_default().push(page.clone());
        }
    }
    for level in children.values_mut() {
        level.sort_by(sibling_order);
    }

    Ok(pages
        .iter()
        .map(|page| {
            let parent = page.parent_id.and_then(|id| by_id.get(&id).copied());
            let kids = children.get(&page.id).map(Vec::as_slice).unwrap_or(&[]);
            page_with_relations(page, parent, kids, base_url)
        })
        .collect())
}

/// get_routes
///
/// The public navigation tree: only visible pages, full depth.
pub async fn get_routes(repo: &dyn Repository) -> Result<Vec<RoutesDto>, AppError> {
    let pages = repo.list_pages().await?;
    let forest = filter_active(build_forest(pages));
    Ok(routes_from_forest(&forest, None))
}

pub async fn get_page_by_id(
    repo: &dyn Repository,
    id: Uuid,
    base_url: &str,
) -> Result<PageDto, AppError> {
    let page = check_page_exists(repo, id).await?;
    with_relations(repo, &page, false, base_url).await
}

pub async fn get_page_by_slug(
    repo: &dyn Repository,
    slug: &str,
    base_url: &str,
) -> Result<PageDto, AppError> {
    let page = find_visible(repo, slug).await?;
    with_relations(repo, &page, true, base_url).await
}

/// get_page_children
///
/// Paginated active children of a visible page.
pub async fn get_page_children(
    repo: &dyn Repository,
    slug: &str,
    query: ChildrenQuery,
    base_url: &str,
) -> Result<PageChildrenResponse, AppError> {
    let page_number = query.page.unwrap_or(DEFAULT_PAGE);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);

    let parent = find_visible(repo, slug).await?;
    let (children, count) = repo
        .active_children_page(parent.id, offset(page_number, per_page), per_page)
        .await?;

    Ok(PageChildrenResponse {
        data: children.iter().map(|c| page_dto(c, base_url)).collect(),
        page: page_number,
        per_page,
        total_pages: total_pages(count, per_page),
    })
}

/// create_page
///
/// Roots are always active; children default to inactive unless the request says otherwise.
pub async fn create_page(
    repo: &dyn Repository,
    dto: CreatePageRequest,
    base_url: &str,
) -> Result<PageDto, AppError> {
    let parent = match dto.parent_id {
        Some(parent_id) => Some(find_parent(repo, parent_id).await?),
        None => None,
    };

    let is_active = parent.is_none() || dto.is_active.unwrap_or(false);
    let new_page = NewPage {
        title: dto.title,
        url_slug: String::new(),
        published_at: dto.published_at,
        content: Some(dto.content.unwrap_or_default()),
        sort: dto.sort,
        page_type: dto.page_type.unwrap_or_default(),
        is_active,
        images: Vec::new(),
        parent_id: dto.parent_id,
    };

    let mut attempt = 0;
    let page = loop {
        attempt += 1;
        let url_slug = unique_slug(repo, &dto.url_slug, None).await?;
        match repo
            .insert_page(NewPage {
                url_slug,
                ..new_page.clone()
            })
            .await
        {
            Ok(page) => break page,
            Err(err) if is_unique_violation(&err) && attempt < SLUG_ATTEMPTS => {
                tracing::debug!(slug = %dto.url_slug, attempt, "slug taken concurrently, retrying");
            }
            Err(err) => return Err(slug_write_error(err, &dto.url_slug)),
        }
    };

    tracing::info!(page_id = %page.id, slug = %page.url_slug, "page created");
    Ok(page_with_relations(&page, parent.as_ref(), &[], base_url))
}

/// update_page
///
/// Partial update. Moving a page validates the new parent and refuses cycles; a page left
/// without a parent becomes an active root.
pub async fn update_page(
    repo: &dyn Repository,
    id: Uuid,
    dto: UpdatePageRequest,
    base_url: &str,
) -> Result<PageDto, AppError> {
    let existing = check_page_exists(repo, id).await?;

    let new_parent_id = match dto.parent_id {
        Some(requested) => requested,
        None => existing.parent_id,
    };
    let reparent = new_parent_id != existing.parent_id;

    if reparent {
        if let Some(parent_id) = new_parent_id {
            let parent = find_parent(repo, parent_id).await?;
            if parent.id == existing.id || existing.is_ancestor_of(&parent) {
                return Err(move_cycle());
            }
        }
    }

    let requested_slug = dto.url_slug.filter(|slug| *slug != existing.url_slug);

    let mut page = Page {
        title: dto.title.unwrap_or_else(|| existing.title.clone()),
        published_at: dto.published_at.or(existing.published_at),
        content: dto.content.or_else(|| existing.content.clone()),
        sort: dto.sort.unwrap_or(existing.sort),
        page_type: dto.page_type.unwrap_or(existing.page_type),
        is_active: dto.is_active.unwrap_or(existing.is_active),
        images: dto.images.unwrap_or_else(|| existing.images.clone()),
        parent_id: new_parent_id,
        ..existing.clone()
    };
    if page.is_root() {
        page.is_active = true;
    }

    let mut attempt = 0;
    let outcome = loop {
        attempt += 1;
        if let Some(slug) = requested_slug.as_deref() {
            page.url_slug = unique_slug(repo, slug, Some(id)).await?;
        }
        match repo.update_page(&page, reparent).await {
            Ok(outcome) => break outcome,
            Err(err) if is_unique_violation(&err) && attempt < SLUG_ATTEMPTS => {
                tracing::debug!(page_id = %id, attempt, "slug taken concurrently, retrying");
            }
            Err(err) => return Err(slug_write_error(err, &page.url_slug)),
        }
    };

    // The repository re-checks the move under the tree lock; a concurrent move or delete
    // surfaces here.
    let saved = match outcome {
        PageUpdate::Saved(saved) => saved,
        PageUpdate::NotFound => return Err(page_not_found(id)),
        PageUpdate::ParentNotFound => {
            return Err(parent_not_found(new_parent_id.unwrap_or_default()));
        }
        PageUpdate::Cycle => return Err(move_cycle()),
    };
    tracing::info!(page_id = %id, reparent, "page updated");

    with_relations(repo, &saved, false, base_url).await
}

/// delete_page
///
/// Removes the page together with its subtree and returns the removed page.
pub async fn delete_page(
    repo: &dyn Repository,
    id: Uuid,
    base_url: &str,
) -> Result<PageDto, AppError> {
    let deleted = repo
        .delete_page(id)
        .await?
        .ok_or_else(|| page_not_found(id))?;

    tracing::info!(page_id = %id, "page subtree deleted");
    Ok(page_dto(&deleted, base_url))
}

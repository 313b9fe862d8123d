use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{AppError, ErrorBody},
    models::{
        ChildrenQuery, CreatePageRequest, PageChildrenResponse, PageDto, RoutesDto,
        UpdatePageRequest,
    },
    services::pages,
    validation::{ValidatedJson, ValidatedQuery, parse_id},
};

/// Multipart field carrying the uploaded file.
const IMAGE_FIELD: &str = "image";

/// ImageUploadForm
///
/// OpenAPI description of the upload form; the handler reads the multipart stream directly.
#[derive(utoipa::ToSchema)]
pub struct ImageUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// get_routes
///
/// [Public Route] Navigation tree of every publicly visible page.
#[utoipa::path(
    get,
    path = "/public/pages",
    tag = "pages",
    responses((status = 200, description = "Visible page tree", body = [RoutesDto]))
)]
pub async fn get_routes(State(state): State<AppState>) -> Result<Json<Vec<RoutesDto>>, AppError> {
    Ok(Json(pages::get_routes(state.repo.as_ref()).await?))
}

/// get_page_by_slug
///
/// [Public Route] A visible page with its parent and active children.
#[utoipa::path(
    get,
    path = "/public/pages/{slug}",
    tag = "pages",
    params(("slug" = String, Path, description = "Page slug")),
    responses(
        (status = 200, description = "Page", body = PageDto),
        (status = 404, description = "Unknown or hidden page", body = ErrorBody)
    )
)]
pub async fn get_page_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PageDto>, AppError> {
    let base_url = state.config.storage_base_url();
    Ok(Json(
        pages::get_page_by_slug(state.repo.as_ref(), &slug, &base_url).await?,
    ))
}

/// get_page_children
///
/// [Public Route] Paginated active children of a visible page.
#[utoipa::path(
    get,
    path = "/public/pages/{slug}/children",
    tag = "pages",
    params(("slug" = String, Path, description = "Parent page slug"), ChildrenQuery),
    responses(
        (status = 200, description = "Children", body = PageChildrenResponse),
        (status = 400, description = "Invalid paging", body = ErrorBody),
        (status = 404, description = "Unknown or hidden page", body = ErrorBody)
    )
)]
pub async fn get_page_children(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ValidatedQuery(query): ValidatedQuery<ChildrenQuery>,
) -> Result<Json<PageChildrenResponse>, AppError> {
    let base_url = state.config.storage_base_url();
    Ok(Json(
        pages::get_page_children(state.repo.as_ref(), &slug, query, &base_url).await?,
    ))
}

/// list_pages
///
/// [Admin Route] Every page with its direct parent and children.
#[utoipa::path(
    get,
    path = "/admin/pages",
    tag = "pages",
    security(("bearer" = [])),
    responses((status = 200, description = "All pages", body = [PageDto]))
)]
pub async fn list_pages(State(state): State<AppState>) -> Result<Json<Vec<PageDto>>, AppError> {
    let base_url = state.config.storage_base_url();
    Ok(Json(pages::list_pages(state.repo.as_ref(), &base_url).await?))
}

/// get_page
#[utoipa::path(
    get,
    path = "/admin/pages/{id}",
    tag = "pages",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Page id (UUID)")),
    responses(
        (status = 200, description = "Page", body = PageDto),
        (status = 404, description = "Unknown page", body = ErrorBody)
    )
)]
pub async fn get_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PageDto>, AppError> {
    let id = parse_id(&id)?;
    let base_url = state.config.storage_base_url();
    Ok(Json(
        pages::get_page_by_id(state.repo.as_ref(), id, &base_url).await?,
    ))
}

/// create_page
///
/// [Admin Route] Creates a page under an optional parent. Colliding slugs get a `-1` suffix.
#[utoipa::path(
    post,
    path = "/admin/pages",
    tag = "pages",
    security(("bearer" = [])),
    request_body = CreatePageRequest,
    responses(
        (status = 201, description = "Created", body = PageDto),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 404, description = "Unknown parent", body = ErrorBody)
    )
)]
pub async fn create_page(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePageRequest>,
) -> Result<(StatusCode, Json<PageDto>), AppError> {
    let base_url = state.config.storage_base_url();
    let page = pages::create_page(state.repo.as_ref(), payload, &base_url).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// update_page
///
/// [Admin Route] Partial update, including moves (`parentId`).
#[utoipa::path(
    patch,
    path = "/admin/pages/{id}",
    tag = "pages",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Page id (UUID)")),
    request_body = UpdatePageRequest,
    responses(
        (status = 200, description = "Updated", body = PageDto),
        (status = 400, description = "Invalid payload or move", body = ErrorBody),
        (status = 404, description = "Unknown page or parent", body = ErrorBody)
    )
)]
pub async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdatePageRequest>,
) -> Result<Json<PageDto>, AppError> {
    let id = parse_id(&id)?;
    let base_url = state.config.storage_base_url();
    Ok(Json(
        pages::update_page(state.repo.as_ref(), id, payload, &base_url).await?,
    ))
}

/// delete_page
///
/// [Admin Route] Deletes the page and its whole subtree.
#[utoipa::path(
    delete,
    path = "/admin/pages/{id}",
    tag = "pages",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Page id (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = PageDto),
        (status = 404, description = "Unknown page", body = ErrorBody)
    )
)]
pub async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PageDto>, AppError> {
    let id = parse_id(&id)?;
    let base_url = state.config.storage_base_url();
    Ok(Json(
        pages::delete_page(state.repo.as_ref(), id, &base_url).await?,
    ))
}

/// upload_image
///
/// [Admin Route] Stores the multipart `image` file for an existing page and returns the
/// generated file name. The file is served afterwards under `/storage/{name}`.
#[utoipa::path(
    post,
    path = "/admin/pages/{id}/upload",
    tag = "pages",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Page id (UUID)")),
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Stored file name", body = String),
        (status = 400, description = "Missing file", body = ErrorBody),
        (status = 404, description = "Unknown page", body = ErrorBody),
        (status = 413, description = "File larger than the upload limit", body = ErrorBody)
    )
)]
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<String>), AppError> {
    let id = parse_id(&id)?;
    pages::check_page_exists(state.repo.as_ref(), id).await?;

    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "upload is not multipart");
        AppError::invalid_request()
    })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            return Err(AppError::invalid_request());
        }

        let file_name = state.storage.save_image(&original_name, &bytes).await?;
        tracing::info!(page_id = %id, file = %file_name, "image uploaded");
        return Ok((StatusCode::CREATED, Json(file_name)));
    }

    Err(AppError::invalid_request())
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    let status = err.status();
    tracing::debug!(error = %err, %status, "multipart read failed");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::operational(status, "File too large")
    } else {
        AppError::invalid_request()
    }
}

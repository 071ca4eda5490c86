use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::placement::{PlacementError, SizeLimits};
use common::publish::UrlPin;
use common::service::Upload;
use common::{Category, Classification, Error};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::Identity;
use crate::extractors::query::AppQuery;
use crate::models::asset::{
    AssetListResponse, DeleteAssetQuery, DeleteAssetResponse, ListAssetsQuery, UploadResponse,
};
use crate::state::AppState;

/// Room for multipart boundaries and the text fields next to the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_body_limit(limits: SizeLimits) -> DefaultBodyLimit {
    let max = usize::try_from(limits.max()).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD))
}

#[utoipa::path(
    post,
    path = "/assets",
    tag = "Assets",
    operation_id = "uploadAsset",
    summary = "Upload a model or image",
    description = "Publishes one file to the content repository. Multipart fields: `file` (required), \
        `category` (`model` or `image`), `brand` and `product` (classification), optional `review` \
        (`true` to open a pull request instead of committing directly) and optional `pin` \
        (`branch` or `commit`, selecting the reference used in the public URL). \
        Models must be `.glb`; images may be `.jpg`, `.jpeg`, `.png` or `.webp`.",
    request_body(content_type = "multipart/form-data", description = "File upload with classification"),
    responses(
        (status = 201, description = "Asset published or pending review", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, AUTH_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (FORBIDDEN)", body = ErrorBody),
        (status = 409, description = "Path already exists (WRITE_CONFLICT)", body = ErrorBody),
        (status = 413, description = "Payload too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 429, description = "Remote rate limit (RATE_LIMITED)", body = ErrorBody),
        (status = 500, description = "Configuration or remote failure (CONFIGURATION_ERROR, REMOTE_API_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, identity, multipart), fields(login = ?identity.login()))]
pub async fn upload_asset(
    identity: Identity,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // Reject before reading the body.
    state.service.authorize(identity.login())?;

    let max_size = state.service.limits().max();
    let mut content: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut category: Option<String> = None;
    let mut brand = String::new();
    let mut product = String::new();
    let mut review = false;
    let mut pin = UrlPin::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Multipart error", e))?
    {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(|s| s.to_string());
                content = Some(read_field_capped(field, max_size).await?);
            }
            Some("category") => category = Some(read_text(field, "category").await?),
            Some("brand") => brand = read_text(field, "brand").await?,
            Some("product") => product = read_text(field, "product").await?,
            Some("review") => review = parse_flag(&read_text(field, "review").await?)?,
            Some("pin") => {
                pin = read_text(field, "pin")
                    .await?
                    .parse()
                    .map_err(AppError::Validation)?
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let content = content.ok_or_else(|| AppError::from(Error::from(PlacementError::MissingFile)))?;
    let category = category
        .ok_or_else(|| AppError::Validation("Missing 'category' field".into()))?
        .parse::<Category>()
        .map_err(|e| AppError::from(Error::from(e)))?;

    let result = state
        .service
        .upload(
            identity.login(),
            Upload {
                category,
                classification: Classification::new(brand, product),
                filename: file_name,
                content,
                review,
                pin,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(result))))
}

#[utoipa::path(
    get,
    path = "/assets",
    tag = "Assets",
    operation_id = "listAssets",
    summary = "List published assets",
    description = "Lists files of one category on the target branch, newest first, optionally \
        narrowed to a namespace prefix. The result is capped at the configured page size.",
    params(ListAssetsQuery),
    responses(
        (status = 200, description = "Asset listing", body = AssetListResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, AUTH_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (FORBIDDEN)", body = ErrorBody),
        (status = 404, description = "Target branch missing (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Configuration or remote failure (CONFIGURATION_ERROR, REMOTE_API_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, identity), fields(login = ?identity.login()))]
pub async fn list_assets(
    identity: Identity,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListAssetsQuery>,
) -> Result<Json<AssetListResponse>, AppError> {
    let category = query
        .category
        .parse::<Category>()
        .map_err(|e| AppError::from(Error::from(e)))?;

    let listing = state
        .service
        .list(identity.login(), category, query.prefix.as_deref())
        .await?;

    Ok(Json(AssetListResponse::from(listing)))
}

#[utoipa::path(
    delete,
    path = "/assets",
    tag = "Assets",
    operation_id = "deleteAsset",
    summary = "Delete a published asset",
    description = "Removes one file under `models/` or `images/`, directly or through a pull \
        request when `review=true` (or when the server always requires review).",
    params(DeleteAssetQuery),
    responses(
        (status = 200, description = "Asset deleted or deletion pending review", body = DeleteAssetResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, AUTH_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden or outside managed roots (FORBIDDEN)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Asset changed concurrently (WRITE_CONFLICT)", body = ErrorBody),
        (status = 500, description = "Configuration or remote failure (CONFIGURATION_ERROR, REMOTE_API_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, identity), fields(login = ?identity.login()))]
pub async fn delete_asset(
    identity: Identity,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DeleteAssetQuery>,
) -> Result<Json<DeleteAssetResponse>, AppError> {
    let removal = state
        .service
        .remove(identity.login(), &query.path, query.review)
        .await?;

    Ok(Json(DeleteAssetResponse::from(removal)))
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, AppError> {
    field
        .text()
        .await
        .map(|text| text.trim().to_string())
        .map_err(|e| multipart_error(&format!("Failed to read {name}"), e))
}

/// The body limit surfaces as a multipart error; keep it a 413.
fn multipart_error(context: &str, err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{context}: {}", err.body_text()))
    } else {
        AppError::Validation(format!("{context}: {err}"))
    }
}

fn parse_flag(value: &str) -> Result<bool, AppError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(AppError::Validation(format!(
            "Invalid review flag '{other}'"
        ))),
    }
}

/// Buffer a file field, failing as soon as it grows past `max_size`.
async fn read_field_capped(
    mut field: axum::extract::multipart::Field<'_>,
    max_size: u64,
) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error("Upload read error", e))?
    {
        if (buf.len() + chunk.len()) as u64 > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds maximum size of {max_size} bytes"
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

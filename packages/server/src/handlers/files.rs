use std::io;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use common::storage::BlobLocator;
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::models::file::{FileListQuery, FileListResponse, FileResponse, StorageStatsResponse};
use crate::records::ContentRecord;
use crate::state::AppState;

/// Multipart framing allowance on top of the configured upload size.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let limit = max_upload_size.saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Files",
    operation_id = "uploadFile",
    summary = "Upload a file",
    description = "Uploads the multipart field `file`. Content is identified by its SHA-256 digest: \
        the first upload of a content creates a record (201), later uploads of identical bytes \
        increment its `upload_count` and return the existing record (200). The filename and MIME \
        type of the first upload are kept.",
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "New content stored", body = FileResponse),
        (status = 200, description = "Duplicate of existing content", body = FileResponse),
        (status = 400, description = "Missing, empty, oversized, or interrupted upload (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Storage backend failure (STORAGE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let reader = StreamReader::new(Box::pin(field.map_err(io::Error::other)));

        let result = state.ingest.ingest(reader, &filename, &content_type).await?;
        let status = if result.created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        return Ok((status, Json(FileResponse::from(result))));
    }

    Err(AppError::Validation("No file provided".into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Files",
    operation_id = "listFiles",
    summary = "List stored files",
    description = "Returns stored files, newest first. Filters are optional and combined with AND: \
        `filename` and `file_type` match case-insensitive substrings, `size_min`/`size_max` bound \
        the size in bytes, `uploaded_after`/`uploaded_before` bound the creation time (RFC 3339, \
        or a bare `YYYY-MM-DD` meaning midnight UTC). All bounds are inclusive.",
    params(FileListQuery),
    responses(
        (status = 200, description = "Matching files", body = FileListResponse),
        (status = 400, description = "Malformed filter (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Storage backend failure (STORAGE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileListQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    let filter = query.into_filter()?;
    let records = state.records.query(&filter).await?;

    let total = records.len() as u64;
    let files = records
        .into_iter()
        .map(|r| FileResponse::from_record(r, false))
        .collect();

    Ok(Json(FileListResponse { files, total }))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Files",
    operation_id = "storageStats",
    summary = "Deduplication statistics",
    responses(
        (status = 200, description = "Storage-wide figures", body = StorageStatsResponse),
        (status = 503, description = "Storage backend failure (STORAGE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn storage_stats(
    State(state): State<AppState>,
) -> Result<Json<StorageStatsResponse>, AppError> {
    Ok(Json(state.records.stats().await?.into()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Get a stored file's metadata",
    params(("id" = String, Path, description = "File record ID (UUID)")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 400, description = "Malformed ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let record = find_record(&state, &id).await?;
    Ok(Json(FileResponse::from_record(record, false)))
}

#[utoipa::path(
    get,
    path = "/{id}/content",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download a stored file",
    description = "Streams the file content. The ETag is the content digest; a matching \
        If-None-Match yields 304.",
    params(("id" = String, Path, description = "File record ID (UUID)")),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let record = find_record(&state, &id).await?;

    let etag_value = format!("\"{}\"", record.digest);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let locator = BlobLocator::parse(&record.locator)?;
    let reader = state.blob_store.get_stream(&locator).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &record.content_type)
        .header(header::CONTENT_LENGTH, record.size_bytes.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&record.original_filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

async fn find_record(state: &AppState, id: &str) -> Result<ContentRecord, AppError> {
    let uuid = Uuid::parse_str(id).map_err(|_| AppError::Validation("Invalid file ID".into()))?;

    state
        .records
        .get(uuid)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}

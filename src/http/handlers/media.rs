//! Chat media upload and retrieval, public profile images.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::http::extract::CurrentUser;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::media::storage::{is_safe_filename, sanitize_original_name};
use crate::media::{sniff, ImageFormat, MediaKind, MediaRecord};
use crate::observability::metrics;

const MEDIA_CACHE_CONTROL: &str = "private, max-age=3600";
const PROFILE_IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// The `file` part of a multipart upload.
#[derive(Debug)]
pub struct FileUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
}

/// Buffer the first multipart field named `file`.
pub async fn read_file_field(mut multipart: Multipart) -> ApiResult<Option<FileUpload>> {
    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(invalid_multipart)?;
        return Ok(Some(FileUpload { bytes, file_name }));
    }
    Ok(None)
}

fn invalid_multipart(err: MultipartError) -> ApiError {
    tracing::debug!(error = %err, "Unreadable multipart body");
    ApiError::BadRequest("Invalid multipart payload.".into())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMedia {
    pub media_id: Uuid,
    pub content_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl From<&MediaRecord> for UploadedMedia {
    fn from(record: &MediaRecord) -> Self {
        Self {
            media_id: record.id,
            content_type: record.format.mime_type(),
            width: record.width,
            height: record.height,
            original_name: record.original_name.clone(),
        }
    }
}

pub async fn upload_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let missing = || ApiError::BadRequest("Media file is required.".into());
    let multipart = multipart.map_err(|_| missing())?;
    let upload = read_file_field(multipart).await?.ok_or_else(missing)?;

    let sniffed = sniff::sniff(&upload.bytes, state.config.uploads.max_chat_media_bytes)?;
    let filename = state
        .storage
        .save(MediaKind::ChatMedia, sniffed.format, &upload.bytes)
        .await?;

    let original_name = upload.file_name.as_deref().and_then(sanitize_original_name);
    let record = MediaRecord::new(user.id, filename, original_name, &sniffed);
    let body = UploadedMedia::from(&record);

    if let Err(err) = state.media.insert(record.clone()) {
        if let Err(remove_err) = state.storage.remove(MediaKind::ChatMedia, &record.filename).await {
            tracing::warn!(filename = %record.filename, error = %remove_err, "Failed to remove orphaned upload");
        }
        return Err(ApiError::Internal(err.to_string()));
    }

    metrics::record_upload(MediaKind::ChatMedia.label(), sniffed.format.extension());
    tracing::info!(
        user_id = %user.id,
        media_id = %record.id,
        format = %sniffed.format,
        size = sniffed.size_bytes,
        "Chat media stored"
    );

    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn get_media(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(media_id): Path<String>,
    request_headers: HeaderMap,
) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound("Media not found.".into());

    let record = Uuid::parse_str(&media_id)
        .ok()
        .and_then(|id| state.media.get(id))
        .filter(|record| is_safe_filename(&record.filename))
        .ok_or_else(not_found)?;

    let metadata = state
        .storage
        .metadata(MediaKind::ChatMedia, &record.filename)
        .await
        .map_err(|_| not_found())?;
    let modified = metadata.modified().unwrap_or(record.created_at);
    let modified_ms = unix_millis(modified);

    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(MEDIA_CACHE_CONTROL));
    headers.insert(header::ETAG, header_value(&entity_tag(record.id, metadata.len(), modified_ms))?);
    headers.insert(header::LAST_MODIFIED, header_value(&http_date(modified))?);
    headers.insert(header::VARY, HeaderValue::from_static("Cookie"));

    if not_modified(&request_headers, &headers, modified_ms) {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    let bytes = state
        .storage
        .read(MediaKind::ChatMedia, &record.filename)
        .await
        .map_err(|_| not_found())?;
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(record.format.mime_type()));

    Ok((StatusCode::OK, headers, bytes).into_response())
}

pub async fn serve_profile_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_safe_filename(&filename) {
        return Err(ApiError::BadRequest("Invalid filename.".into()));
    }

    let bytes = state
        .storage
        .read(MediaKind::ProfileImage, &filename)
        .await
        .map_err(|_| ApiError::NotFound("Image not found.".into()))?;
    let content_type = ImageFormat::from_filename(&filename)
        .map(ImageFormat::mime_type)
        .unwrap_or(FALLBACK_CONTENT_TYPE);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, PROFILE_IMAGE_CACHE_CONTROL),
        ],
        bytes,
    )
        .into_response())
}

/// `If-None-Match` equal to our tag, or `If-Modified-Since` at or after the
/// file's modification time.
fn not_modified(request: &HeaderMap, response: &HeaderMap, modified_ms: u64) -> bool {
    if let Some(tag) = request.get(header::IF_NONE_MATCH) {
        if response.get(header::ETAG) == Some(tag) {
            return true;
        }
    }

    request
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .and_then(|since| u64::try_from(since.timestamp_millis()).ok())
        .is_some_and(|since_ms| modified_ms <= since_ms)
}

/// Quoted SHA-256 of `{id}:{size}:{mtime_ms}`.
fn entity_tag(id: Uuid, size: u64, modified_ms: u64) -> String {
    let digest = Sha256::digest(format!("{id}:{size}:{modified_ms}").as_bytes());
    format!("\"{digest:x}\"")
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ApiError::Internal(e.to_string()))
}

//! File upload route.
//!
//! Accepts one image per request in the multipart field `file` and stores it
//! under the configured upload directory, which is served at `/uploads`.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use crate::{
    config::ApiConfig,
    error::{ApiError, ApiResult},
    state::AppState,
    types::UploadResponse,
};

/// Public URL prefix for stored uploads.
pub const UPLOADS_PATH: &str = "/uploads";

const FILE_FIELD: &str = "file";

/// Keep `[A-Za-z0-9._-]`, replace everything else, and never allow a path.
pub(crate) fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

/// `<millis>-<random>-<name>`
fn stored_filename(original: &str) -> String {
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        sanitize_filename(original)
    )
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(limit)
    } else {
        ApiError::invalid_input(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// POST /upload
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Uploads",
    request_body(content_type = "multipart/form-data", description = "Image in field `file`"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file in the request", body = ApiError),
        (status = 413, description = "File too large", body = ApiError),
        (status = 415, description = "Not an image", body = ApiError),
    ),
)]
pub async fn upload_file(
    State(config): State<Arc<ApiConfig>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let limit = config.upload_max_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::unsupported_media_type(format!(
                "Only image uploads are accepted, got '{}'",
                content_type
            )));
        }

        let original = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        if bytes.len() > limit {
            return Err(ApiError::payload_too_large(limit));
        }

        let filename = stored_filename(&original);
        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .map_err(|e| ApiError::internal_error(format!("Cannot create upload directory: {}", e)))?;
        tokio::fs::write(config.upload_dir.join(&filename), &bytes)
            .await
            .map_err(|e| ApiError::internal_error(format!("Cannot store upload: {}", e)))?;

        info!(filename = %filename, bytes = bytes.len(), "File uploaded");
        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            path: format!("{}/{}", UPLOADS_PATH, filename),
            filename,
        }));
    }

    Err(ApiError::missing_field(FILE_FIELD))
}

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Routes under `/upload`.
pub fn create_router(config: &ApiConfig) -> Router<AppState> {
    Router::new()
        .route("/", post(upload_file))
        .layer(DefaultBodyLimit::max(
            config.upload_max_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
}

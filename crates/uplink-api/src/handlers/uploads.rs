//! Resumable upload session handlers.
//!
//! Creation and inspection are plain JSON endpoints; the data endpoint
//! accepts either a raw request body or a single-part multipart form, both
//! funneled into the same append path.

use std::io;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use tokio_util::io::StreamReader;
use uplink_core::{AppError, FileInfo, UploadSession};
use uuid::Uuid;

use crate::auth::CallerContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::multipart::multipart_parse_error;
use crate::services::uploads::{ByteReader, CreateSessionRequest};
use crate::state::AppState;

/// Create a resumable upload session
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    tag = "uploads",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Upload session created", body = UploadSession),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse),
        (status = 413, description = "Declared size too large", body = ErrorResponse),
        (status = 501, description = "Feature disabled", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_upload(
    ctx: CallerContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session = state.uploads.create_session(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Fetch an upload session
#[utoipa::path(
    get,
    path = "/api/v1/uploads/{id}",
    tag = "uploads",
    params(
        ("id" = Uuid, Path, description = "Upload session id")
    ),
    responses(
        (status = 200, description = "Upload session", body = UploadSession),
        (status = 403, description = "Not the session owner", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_upload(
    ctx: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session = state.uploads.get_session(&ctx, id).await?;
    Ok(Json(session))
}

/// Append data to an upload session
///
/// Accepts a raw body, or a multipart form whose first part carries the
/// bytes. Returns the finished file record once the session completes,
/// 204 otherwise.
#[utoipa::path(
    post,
    path = "/api/v1/uploads/{id}",
    tag = "uploads",
    params(
        ("id" = Uuid, Path, description = "Upload session id")
    ),
    responses(
        (status = 200, description = "Upload complete", body = FileInfo),
        (status = 204, description = "Chunk accepted, more data expected"),
        (status = 400, description = "Invalid input or declared length", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Concurrent append detected", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_data(
    ctx: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> Result<impl IntoResponse, HttpAppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let declared_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());

    let is_multipart = content_type
        .as_deref()
        .map(|ct| ct.starts_with("multipart/"))
        .unwrap_or(false);

    let body_stream = request
        .into_body()
        .into_data_stream()
        .map_err(|e| io::Error::other(e));

    let result = if is_multipart {
        // to_str succeeded above, so the header is present here.
        let content_type = content_type.unwrap_or_default();
        let boundary = multer::parse_boundary(&content_type)
            .map_err(|_| AppError::InvalidParam("missing multipart boundary".to_string()))?;
        let mut multipart = multer::Multipart::new(
            body_stream.map_err(|e| AppError::BadRequest(e.to_string())),
            boundary,
        );
        let field = multipart
            .next_field()
            .await
            .map_err(multipart_parse_error)?
            .ok_or_else(|| AppError::InvalidParam("empty multipart form".to_string()))?;
        let reader: ByteReader =
            Box::pin(StreamReader::new(field.map_err(io::Error::other).boxed()));
        // Content-Length covers the whole form, not the part.
        state.uploads.append_data(&ctx, id, reader, None).await?
    } else {
        // Raw appends must declare their length so a chunk that cannot fit
        // the session is rejected before any byte is written.
        let declared = declared_length.ok_or_else(|| {
            AppError::InvalidParam("Content-Length is required for raw appends".to_string())
        })?;
        let reader: ByteReader = Box::pin(StreamReader::new(body_stream.boxed()));
        state
            .uploads
            .append_data(&ctx, id, reader, Some(declared))
            .await?
    };

    match result {
        Some(info) => Ok((StatusCode::OK, Json(info)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

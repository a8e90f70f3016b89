//! Direct file upload handler.
//!
//! One endpoint, two transports: a multipart form handed to the ingestion
//! engine, or a raw body when `channel_id` and `filename` arrive in the
//! query string.

use std::io;
use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use tokio_util::io::StreamReader;
use uplink_core::constants::BOOKMARK_FILE_OWNER;
use uplink_core::AppError;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::auth::CallerContext;
use crate::services::multipart::{BodyStream, FileUploadResponse};
use crate::services::uploads::ByteReader;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct FileUploadQuery {
    /// Destination channel; required for raw uploads, optional for multipart
    /// forms that carry it as a field.
    pub channel_id: Option<Uuid>,
    /// Filename for raw uploads.
    pub filename: Option<String>,
    /// Correlation id echoed back to the client.
    pub client_id: Option<String>,
    /// Attach the files to a channel bookmark instead of the caller.
    #[serde(default)]
    pub bookmark: bool,
}

/// Upload one or more files
#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "files",
    params(FileUploadQuery),
    responses(
        (status = 201, description = "Files uploaded", body = FileUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse),
        (status = 413, description = "Payload too large", body = ErrorResponse),
        (status = 501, description = "Feature disabled", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_files(
    ctx: CallerContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileUploadQuery>,
    request: Request,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.config.file_attachments_enabled {
        return Err(HttpAppError::from(AppError::FeatureDisabled(
            "file attachments".to_string(),
        )));
    }

    // Bookmark files belong to a shared sentinel owner, not the caller.
    let creator_id = if query.bookmark {
        BOOKMARK_FILE_OWNER
    } else {
        ctx.user_id
    };

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let is_multipart = content_type
        .as_deref()
        .map(|ct| ct.starts_with("multipart/"))
        .unwrap_or(false);

    let response = if is_multipart {
        let content_type = content_type.unwrap_or_default();
        let boundary = multer::parse_boundary(&content_type)
            .map_err(|_| AppError::InvalidParam("missing multipart boundary".to_string()))?;
        let body: BodyStream = Box::pin(
            request
                .into_body()
                .into_data_stream()
                .map_err(|e| AppError::BadRequest(e.to_string())),
        );
        state
            .ingest
            .ingest(&ctx, creator_id, boundary, body, query.channel_id)
            .await?
    } else {
        upload_raw(&ctx, &state, creator_id, query, request).await?
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Raw-body upload: destination and name come from the query string and the
/// size from Content-Length, which must be present and non-zero.
async fn upload_raw(
    ctx: &CallerContext,
    state: &AppState,
    creator_id: Uuid,
    query: FileUploadQuery,
    request: Request,
) -> Result<FileUploadResponse, AppError> {
    let channel_id = query
        .channel_id
        .ok_or_else(|| AppError::InvalidParam("channel_id is required".to_string()))?;
    let filename = query
        .filename
        .ok_or_else(|| AppError::InvalidParam("filename is required".to_string()))?;

    let declared_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());
    match declared_length {
        Some(len) if len > 0 => {}
        _ => {
            return Err(AppError::BadRequest(
                "a non-zero Content-Length is required for raw uploads".to_string(),
            ))
        }
    }

    if !state
        .access
        .can_upload_to_channel(ctx.user_id, channel_id)
        .await?
    {
        return Err(AppError::PermissionDenied(format!(
            "cannot upload to channel {}",
            channel_id
        )));
    }

    let reader: ByteReader = Box::pin(StreamReader::new(
        request
            .into_body()
            .into_data_stream()
            .map_err(io::Error::other)
            .boxed(),
    ));
    let mut info = state
        .uploads
        .upload_file(creator_id, channel_id, &filename, reader, declared_length)
        .await?;
    info.client_id = query.client_id.clone();

    let client_ids = match query.client_id {
        Some(client_id) => vec![client_id],
        None => Vec::new(),
    };
    Ok(FileUploadResponse {
        file_infos: vec![info],
        client_ids,
    })
}

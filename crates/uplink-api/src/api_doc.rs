//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services;
use uplink_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Uplink API",
        version = "0.1.0",
        description = "Resumable upload sessions and direct file ingestion. All endpoints are versioned under /api/v1/."
    ),
    paths(
        handlers::uploads::create_upload,
        handlers::uploads::get_upload,
        handlers::uploads::upload_data,
        handlers::files::upload_files,
    ),
    components(schemas(
        models::UploadSession,
        models::UploadType,
        models::FileInfo,
        services::uploads::CreateSessionRequest,
        services::multipart::FileUploadResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "uploads", description = "Resumable upload sessions"),
        (name = "files", description = "Direct file uploads")
    )
)]
pub struct ApiDoc;

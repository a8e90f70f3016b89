//! Durable file metadata produced when an upload completes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::validation::file_extension;

/// The durable record produced when an upload session completes (or when a
/// direct upload finishes in one shot). `thumbnail_path` and `preview_path`
/// are populated asynchronously by downstream processing, never here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileInfo {
    /// Matches the id of the session that produced it.
    pub id: Uuid,
    /// Uploading user, or the bookmark-owner sentinel.
    pub creator_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
    pub create_at: DateTime<Utc>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_path: Option<String>,
    pub name: String,
    pub extension: String,
    pub size: i64,
    pub mime_type: String,
    /// Federation-only; blank for client uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Caller-supplied correlation token, echoed back per uploaded file.
    /// Never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl FileInfo {
    /// Build metadata for a finished upload. The MIME type is derived from
    /// the filename extension; unknown extensions fall back to octet-stream.
    pub fn from_upload(
        id: Uuid,
        creator_id: Uuid,
        channel_id: Option<Uuid>,
        path: String,
        name: String,
        size: i64,
    ) -> Self {
        let extension = file_extension(&name);
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        FileInfo {
            id,
            creator_id,
            channel_id,
            create_at: Utc::now(),
            path,
            thumbnail_path: None,
            preview_path: None,
            name,
            extension,
            size,
            mime_type,
            remote_id: None,
            client_id: None,
        }
    }
}

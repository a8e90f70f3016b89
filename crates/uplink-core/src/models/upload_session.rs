//! Resumable upload session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::{IMPORT_PATH_PREFIX, UPLOAD_PATH_PREFIX};
use crate::AppError;

/// Kind of upload a session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    /// Ordinary channel attachment.
    Attachment,
    /// Bulk import archive; requires system-admin capability.
    Import,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Attachment => "attachment",
            UploadType::Import => "import",
        }
    }
}

impl std::str::FromStr for UploadType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attachment" => Ok(UploadType::Attachment),
            "import" => Ok(UploadType::Import),
            other => Err(AppError::InvalidParam(format!(
                "Invalid upload type: {}",
                other
            ))),
        }
    }
}

/// A durable record of one in-progress or completed upload, identified by a
/// byte offset and a declared total size. A session is complete exactly when
/// `file_offset == file_size`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadSession {
    /// Opaque unique identifier, generated server-side.
    pub id: Uuid,
    #[serde(rename = "type")]
    pub upload_type: UploadType,
    pub create_at: DateTime<Utc>,
    /// Owning user.
    pub user_id: Uuid,
    /// Destination channel; absent for import sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
    /// Sanitized client-supplied name, used for storage path construction.
    pub filename: String,
    /// Storage key the bytes are written under.
    #[serde(skip_serializing)]
    pub path: String,
    /// Declared total size in bytes; immutable after creation.
    pub file_size: i64,
    /// Bytes committed so far; monotonically non-decreasing.
    pub file_offset: i64,
    /// Federation-only: id of the remote cluster driving the upload.
    /// Forced blank for ordinary client-initiated sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Federation-only: the file id the remote expects the result under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_file_id: Option<Uuid>,
}

impl UploadSession {
    /// Build a fresh session with a server-generated id and zero offset.
    pub fn new(
        upload_type: UploadType,
        user_id: Uuid,
        channel_id: Option<Uuid>,
        filename: String,
        file_size: i64,
    ) -> Self {
        let id = Uuid::new_v4();
        let path = Self::storage_path(upload_type, id, &filename);
        UploadSession {
            id,
            upload_type,
            create_at: Utc::now(),
            user_id,
            channel_id,
            filename,
            path,
            file_size,
            file_offset: 0,
            remote_id: None,
            req_file_id: None,
        }
    }

    /// Storage key for a session's bytes. Imports live under their own
    /// prefix so they never mix with the attachment tree.
    pub fn storage_path(upload_type: UploadType, id: Uuid, filename: &str) -> String {
        match upload_type {
            UploadType::Attachment => format!("{}/{}/{}", UPLOAD_PATH_PREFIX, id, filename),
            UploadType::Import => format!("{}/{}_{}", IMPORT_PATH_PREFIX, id, filename),
        }
    }

    /// Bytes the session still expects.
    pub fn remaining(&self) -> i64 {
        self.file_size - self.file_offset
    }

    /// A session is complete iff every declared byte has been committed.
    pub fn is_complete(&self) -> bool {
        self.file_offset == self.file_size
    }
}

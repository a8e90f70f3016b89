//! Session manager for resumable uploads.
//!
//! Creates, validates, and finalizes upload sessions. Every append re-runs
//! the creation-time permission checks because permissions can change between
//! creation and completion. Offsets advance through the session store's
//! compare-and-set so interleaved appends against the same session fail with
//! `ConflictingAppend` instead of silently overwriting.

use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use uplink_core::{AppError, Config, FileInfo, UploadSession, UploadType};
use uplink_core::validation::sanitize_filename;
use uplink_db::{AccessControl, FileInfoStore, SessionStore};
use uplink_storage::FileStore;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerContext;

/// Boxed byte source fed into an append.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Request to create an upload session
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    #[serde(rename = "type")]
    pub upload_type: UploadType,
    /// Destination channel; required for attachment sessions.
    pub channel_id: Option<Uuid>,
    /// Client-supplied name; sanitized before any storage key is derived.
    pub filename: String,
    /// Declared total size in bytes.
    pub file_size: i64,
    /// Federation-only; force-cleared for ordinary callers.
    pub remote_id: Option<String>,
    /// Federation-only; force-cleared for ordinary callers.
    pub req_file_id: Option<Uuid>,
}

pub struct UploadService {
    sessions: Arc<dyn SessionStore>,
    file_infos: Arc<dyn FileInfoStore>,
    access: Arc<dyn AccessControl>,
    store: Arc<dyn FileStore>,
    config: Config,
}

impl UploadService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        file_infos: Arc<dyn FileInfoStore>,
        access: Arc<dyn AccessControl>,
        store: Arc<dyn FileStore>,
        config: Config,
    ) -> Self {
        UploadService {
            sessions,
            file_infos,
            access,
            store,
            config,
        }
    }

    /// The creation-time permission gauntlet, in order: feature flag, then
    /// type-specific authorization. Re-run verbatim on every append.
    async fn check_upload_permissions(
        &self,
        ctx: &CallerContext,
        upload_type: UploadType,
        channel_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        if !self.config.file_attachments_enabled {
            return Err(AppError::FeatureDisabled(
                "file attachments".to_string(),
            ));
        }
        match upload_type {
            UploadType::Import => {
                if self.config.cloud {
                    return Err(AppError::Unsupported(
                        "import uploads are not available on cloud deployments".to_string(),
                    ));
                }
                if !ctx.is_system_admin {
                    return Err(AppError::PermissionDenied(
                        "import uploads require system admin".to_string(),
                    ));
                }
            }
            UploadType::Attachment => {
                let channel_id = channel_id.ok_or_else(|| {
                    AppError::InvalidParam("channel_id is required".to_string())
                })?;
                if !self
                    .access
                    .can_upload_to_channel(ctx.user_id, channel_id)
                    .await?
                {
                    return Err(AppError::PermissionDenied(format!(
                        "cannot upload to channel {}",
                        channel_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Create a resumable upload session. Creation is atomic: the session is
    /// persisted with `file_offset = 0`, or not at all. A zero-size session
    /// completes synchronously here.
    pub async fn create_session(
        &self,
        ctx: &CallerContext,
        request: CreateSessionRequest,
    ) -> Result<UploadSession, AppError> {
        self.check_upload_permissions(ctx, request.upload_type, request.channel_id)
            .await?;

        if request.file_size < 0 {
            return Err(AppError::InvalidParam(format!(
                "file_size must be non-negative, got {}",
                request.file_size
            )));
        }
        if request.file_size > self.config.max_file_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds max {} bytes",
                request.file_size, self.config.max_file_size_bytes
            )));
        }

        let filename = sanitize_filename(&request.filename)?;
        let channel_id = match request.upload_type {
            UploadType::Attachment => request.channel_id,
            UploadType::Import => None,
        };

        let mut session = UploadSession::new(
            request.upload_type,
            ctx.user_id,
            channel_id,
            filename,
            request.file_size,
        );
        // Federation fields are spoofable; only a remote caller may set them.
        if ctx.remote_id.is_some() {
            session.remote_id = request.remote_id;
            session.req_file_id = request.req_file_id;
        }

        self.sessions.save(&session).await?;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            upload_type = session.upload_type.as_str(),
            file_size = session.file_size,
            "Upload session created"
        );

        if session.file_size == 0 {
            self.finalize(&session).await?;
        }

        Ok(session)
    }

    /// Fetch a session. Restricted to the owning user or a system admin.
    pub async fn get_session(
        &self,
        ctx: &CallerContext,
        id: Uuid,
    ) -> Result<UploadSession, AppError> {
        let session = self
            .sessions
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session not found: {}", id)))?;

        if session.user_id != ctx.user_id && !ctx.is_system_admin {
            return Err(AppError::PermissionDenied(
                "not the session owner".to_string(),
            ));
        }

        Ok(session)
    }

    /// Append bytes at the session's current offset.
    ///
    /// Returns `Some(FileInfo)` when the session completes, `None` when more
    /// appends are expected. Calling again on an already-complete session is
    /// an idempotent no-op that returns the stored `FileInfo`.
    pub async fn append_data(
        &self,
        ctx: &CallerContext,
        id: Uuid,
        reader: ByteReader,
        declared_length: Option<i64>,
    ) -> Result<Option<FileInfo>, AppError> {
        let session = self.get_session(ctx, id).await?;
        self.check_upload_permissions(ctx, session.upload_type, session.channel_id)
            .await?;

        if session.is_complete() {
            return Ok(Some(self.finalize(&session).await?));
        }

        let remaining = session.remaining();
        if let Some(declared) = declared_length {
            if declared > remaining {
                return Err(AppError::InvalidLength {
                    declared,
                    remaining,
                });
            }
        }

        // Accept at most the remaining bytes; any surplus is left unread.
        let limited: ByteReader = Box::pin(reader.take(remaining as u64));
        let written = self
            .store
            .write_at(&session.path, session.file_offset as u64, limited)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))? as i64;

        let new_offset = session.file_offset + written;
        self.sessions
            .advance_offset(id, session.file_offset, new_offset)
            .await?;

        tracing::info!(
            session_id = %id,
            offset = session.file_offset,
            written = written,
            new_offset = new_offset,
            file_size = session.file_size,
            "Appended data to upload session"
        );

        if new_offset == session.file_size {
            let mut completed = session.clone();
            completed.file_offset = new_offset;
            Ok(Some(self.finalize(&completed).await?))
        } else {
            Ok(None)
        }
    }

    /// Materialize the durable `FileInfo` for a complete session. Idempotent:
    /// the first writer wins and later calls return the stored record.
    async fn finalize(&self, session: &UploadSession) -> Result<FileInfo, AppError> {
        if let Some(existing) = self.file_infos.get(session.id).await? {
            return Ok(existing);
        }

        if session.file_size == 0 {
            // Materialize the empty object so every FileInfo has a blob.
            self.store
                .write_at(&session.path, 0, Box::pin(tokio::io::empty()))
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }

        let info = FileInfo::from_upload(
            session.id,
            session.user_id,
            session.channel_id,
            session.path.clone(),
            session.filename.clone(),
            session.file_size,
        );
        self.file_infos.save(&info).await?;

        tracing::info!(
            session_id = %session.id,
            path = %info.path,
            size = info.size,
            mime_type = %info.mime_type,
            "Upload session completed"
        );

        // A concurrent finalize may have won the insert; return the stored row.
        match self.file_infos.get(session.id).await? {
            Some(stored) => Ok(stored),
            None => Ok(info),
        }
    }

    /// One-shot upload: create, append, and complete inlined, with no durable
    /// session row. Used by the direct `/files` paths.
    ///
    /// The caller must have already authorized the destination channel; this
    /// method enforces only the feature flag and the size ceiling (while
    /// streaming, for transports with no declared length).
    pub async fn upload_file(
        &self,
        creator_id: Uuid,
        channel_id: Uuid,
        filename: &str,
        reader: ByteReader,
        declared_length: Option<i64>,
    ) -> Result<FileInfo, AppError> {
        if !self.config.file_attachments_enabled {
            return Err(AppError::FeatureDisabled(
                "file attachments".to_string(),
            ));
        }

        let max = self.config.max_file_size_bytes;
        if let Some(declared) = declared_length {
            if declared > max {
                return Err(AppError::PayloadTooLarge(format!(
                    "{} bytes exceeds max {} bytes",
                    declared, max
                )));
            }
        }

        let filename = sanitize_filename(filename)?;
        let id = Uuid::new_v4();
        let path = UploadSession::storage_path(UploadType::Attachment, id, &filename);

        // Cap at max + 1 so an oversized stream is detectable without
        // buffering it.
        let limited: ByteReader = Box::pin(reader.take(max as u64 + 1));
        let written = self
            .store
            .write_at(&path, 0, limited)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))? as i64;

        if written > max {
            if let Err(e) = self.store.delete(&path).await {
                tracing::warn!(error = %e, path = %path, "Failed to delete oversized upload");
            }
            return Err(AppError::PayloadTooLarge(format!(
                "stream exceeds max {} bytes",
                max
            )));
        }

        let info = FileInfo::from_upload(
            id,
            creator_id,
            Some(channel_id),
            path,
            filename,
            written,
        );
        self.file_infos.save(&info).await?;

        tracing::info!(
            file_id = %info.id,
            channel_id = %channel_id,
            size = written,
            mime_type = %info.mime_type,
            "Direct upload completed"
        );

        Ok(info)
    }
}

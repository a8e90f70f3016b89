//! Streaming multipart ingestion.
//!
//! Multipart forms interleave metadata fields with file parts in any order,
//! but streaming a file to storage requires knowing its destination channel
//! up front. The engine resolves this with a two-pass approach over a shared
//! body: a bounded classification pass decides whether the form can be
//! streamed (channel known before the first file) or must be fully buffered
//! (a file part arrives first), then a second pass re-parses the recorded
//! prefix chained with the live remainder and performs the uploads.
//!
//! The classification pass is cut off at `peek_buffer_bytes`; running out
//! of window before the layout is known is not an error, it just means the
//! form falls back to the buffered mode, whose memory use is bounded by
//! the per-file size cap instead.
//!
//! Failures mid-form are not rolled back: files committed before the error
//! stay committed, and the caller receives the error.

mod tee;

pub use tee::BodyStream;

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use tokio_util::io::StreamReader;
use uplink_core::{AppError, Config, FileInfo};
use uplink_db::AccessControl;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerContext;
use crate::services::uploads::{ByteReader, UploadService};
use tee::{is_saturated, new_recorder, take_recorded, SharedBody, TeeStream};

const CHANNEL_ID_FIELD: &str = "channel_id";
const CLIENT_IDS_FIELD: &str = "client_ids";

/// Result of ingesting one multipart form: the created files, paired with
/// the client-supplied correlation ids when the form carried any.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileUploadResponse {
    pub file_infos: Vec<FileInfo>,
    pub client_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    /// Channel resolved before the first file; files stream straight through.
    Streaming,
    /// A file part preceded the channel; the whole form is read into memory.
    Buffered,
}

pub struct MultipartIngest {
    uploads: Arc<UploadService>,
    access: Arc<dyn AccessControl>,
    config: Config,
}

impl MultipartIngest {
    pub fn new(uploads: Arc<UploadService>, access: Arc<dyn AccessControl>, config: Config) -> Self {
        MultipartIngest {
            uploads,
            access,
            config,
        }
    }

    /// Ingest one multipart form.
    ///
    /// Permission checks run against `ctx`; the resulting files are owned by
    /// `creator_id`, which differs from the caller for bookmark uploads.
    pub async fn ingest(
        &self,
        ctx: &CallerContext,
        creator_id: Uuid,
        boundary: String,
        body: BodyStream,
        query_channel_id: Option<Uuid>,
    ) -> Result<FileUploadResponse, AppError> {
        let shared = SharedBody::new(body);
        let recorder = new_recorder(self.config.peek_buffer_bytes);

        // With the channel already known from the query string the form can
        // stream unconditionally and no classification pass is needed.
        let mode = if query_channel_id.is_some() {
            ParseMode::Streaming
        } else {
            self.classify(&shared, &recorder, &boundary).await?
        };

        let recorded = take_recorded(&recorder);
        tracing::debug!(
            mode = ?mode,
            replayed_chunks = recorded.chunks.len(),
            peek_saturated = recorded.saturated,
            "Multipart form classified"
        );

        let replay = futures::stream::iter(
            recorded
                .chunks
                .into_iter()
                .map(Ok::<Bytes, AppError>)
                .collect::<Vec<_>>(),
        );
        let resumed = replay.chain(shared.handle());
        let multipart = multer::Multipart::new(resumed, boundary);

        match mode {
            ParseMode::Streaming => {
                self.ingest_streaming(ctx, creator_id, multipart, query_channel_id)
                    .await
            }
            ParseMode::Buffered => self.ingest_buffered(ctx, creator_id, multipart).await,
        }
    }

    /// First pass: read fields through the recording tee until the form
    /// layout is known. Nothing seen here is acted on; the second pass
    /// re-parses everything from the replay.
    ///
    /// The tee cuts this pass off at the peek cap, which surfaces here as
    /// a parse error or premature end-of-form. An inconclusive pass is
    /// never an error: the request simply takes the buffered path.
    async fn classify(
        &self,
        shared: &SharedBody,
        recorder: &tee::Recorder,
        boundary: &str,
    ) -> Result<ParseMode, AppError> {
        let teed = TeeStream::new(shared.handle(), recorder.clone());
        let mut multipart = multer::Multipart::new(teed, boundary.to_string());

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                // Form ended with no file and no channel; buffering is the
                // cheapest way to fail with precise errors.
                Ok(None) => return Ok(ParseMode::Buffered),
                Err(e) if is_saturated(recorder) => {
                    tracing::debug!(error = %e, "Peek window exhausted, falling back");
                    return Ok(ParseMode::Buffered);
                }
                Err(e) => return Err(multipart_parse_error(e)),
            };

            if field.file_name().is_some() {
                return Ok(ParseMode::Buffered);
            }
            if field.name() == Some(CHANNEL_ID_FIELD) {
                return Ok(ParseMode::Streaming);
            }
            // Drain metadata fields without judging them; the second pass
            // enforces the per-field size cap.
            if let Err(e) = drain_field(field).await {
                if is_saturated(recorder) {
                    return Ok(ParseMode::Buffered);
                }
                return Err(e);
            }
        }
    }

    async fn ingest_streaming(
        &self,
        ctx: &CallerContext,
        creator_id: Uuid,
        mut multipart: multer::Multipart<'static>,
        query_channel_id: Option<Uuid>,
    ) -> Result<FileUploadResponse, AppError> {
        let mut channel_id = query_channel_id;
        let mut client_ids: Vec<String> = Vec::new();
        // Decided when the first file arrives and fixed from then on.
        let mut expect_client_ids: Option<bool> = None;
        let mut file_infos: Vec<FileInfo> = Vec::new();

        loop {
            let field = multipart
                .next_field()
                .await
                .map_err(multipart_parse_error)?;
            let field = match field {
                Some(field) => field,
                None => break,
            };

            if let Some(filename) = field.file_name().map(str::to_string) {
                let channel = channel_id.ok_or_else(|| {
                    AppError::InvalidParam("channel_id must precede file parts".to_string())
                })?;

                match expect_client_ids {
                    None => expect_client_ids = Some(!client_ids.is_empty()),
                    Some(_) => {}
                }
                if expect_client_ids == Some(true) && client_ids.len() <= file_infos.len() {
                    return Err(AppError::InvalidParam(
                        "client_ids must pair one-to-one with files".to_string(),
                    ));
                }

                if !self
                    .access
                    .can_upload_to_channel(ctx.user_id, channel)
                    .await?
                {
                    return Err(AppError::PermissionDenied(format!(
                        "cannot upload to channel {}",
                        channel
                    )));
                }

                let reader: ByteReader =
                    Box::pin(StreamReader::new(field.map_err(io::Error::other).boxed()));
                let mut info = self
                    .uploads
                    .upload_file(creator_id, channel, &filename, reader, None)
                    .await?;
                if expect_client_ids == Some(true) {
                    info.client_id = Some(client_ids[file_infos.len()].clone());
                }
                file_infos.push(info);
                continue;
            }

            match field.name() {
                Some(CHANNEL_ID_FIELD) => {
                    let text = read_field_text(field, self.config.max_form_field_bytes).await?;
                    let parsed = parse_channel_id(&text)?;
                    match channel_id {
                        Some(existing) if existing != parsed => {
                            return Err(AppError::MultipleChannelIds)
                        }
                        _ => channel_id = Some(parsed),
                    }
                }
                Some(CLIENT_IDS_FIELD) => {
                    if expect_client_ids == Some(false) {
                        return Err(AppError::InvalidParam(
                            "client_ids must precede file parts".to_string(),
                        ));
                    }
                    let text = read_field_text(field, self.config.max_form_field_bytes).await?;
                    client_ids.push(text);
                }
                _ => {
                    read_field_text(field, self.config.max_form_field_bytes).await?;
                }
            }
        }

        if expect_client_ids == Some(true) && client_ids.len() != file_infos.len() {
            return Err(AppError::InvalidParam(
                "client_ids must pair one-to-one with files".to_string(),
            ));
        }
        if expect_client_ids != Some(true) {
            client_ids.clear();
        }

        tracing::info!(
            files = file_infos.len(),
            user_id = %ctx.user_id,
            "Streaming multipart ingest complete"
        );

        Ok(FileUploadResponse {
            file_infos,
            client_ids,
        })
    }

    async fn ingest_buffered(
        &self,
        ctx: &CallerContext,
        creator_id: Uuid,
        mut multipart: multer::Multipart<'static>,
    ) -> Result<FileUploadResponse, AppError> {
        let mut channel_id: Option<Uuid> = None;
        let mut client_ids: Vec<String> = Vec::new();
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();

        loop {
            let field = multipart
                .next_field()
                .await
                .map_err(multipart_parse_error)?;
            let mut field = match field {
                Some(field) => field,
                None => break,
            };

            if let Some(filename) = field.file_name().map(str::to_string) {
                let mut data: Vec<u8> = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_parse_error)? {
                    if data.len() + chunk.len() > self.config.max_file_size_bytes as usize {
                        return Err(AppError::PayloadTooLarge(format!(
                            "file part exceeds max {} bytes",
                            self.config.max_file_size_bytes
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }
                files.push((filename, data));
                continue;
            }

            match field.name() {
                Some(CHANNEL_ID_FIELD) => {
                    let text = read_field_text(field, self.config.max_form_field_bytes).await?;
                    let parsed = parse_channel_id(&text)?;
                    match channel_id {
                        Some(existing) if existing != parsed => {
                            return Err(AppError::MultipleChannelIds)
                        }
                        _ => channel_id = Some(parsed),
                    }
                }
                Some(CLIENT_IDS_FIELD) => {
                    let text = read_field_text(field, self.config.max_form_field_bytes).await?;
                    client_ids.push(text);
                }
                _ => {
                    read_field_text(field, self.config.max_form_field_bytes).await?;
                }
            }
        }

        let channel = channel_id.ok_or_else(|| {
            AppError::InvalidParam("channel_id is required".to_string())
        })?;
        if !client_ids.is_empty() && client_ids.len() != files.len() {
            return Err(AppError::BadRequest(format!(
                "{} client_ids for {} files",
                client_ids.len(),
                files.len()
            )));
        }

        if !self
            .access
            .can_upload_to_channel(ctx.user_id, channel)
            .await?
        {
            return Err(AppError::PermissionDenied(format!(
                "cannot upload to channel {}",
                channel
            )));
        }

        let mut file_infos = Vec::with_capacity(files.len());
        for (index, (filename, data)) in files.into_iter().enumerate() {
            let reader: ByteReader = Box::pin(std::io::Cursor::new(data));
            let mut info = self
                .uploads
                .upload_file(creator_id, channel, &filename, reader, None)
                .await?;
            info.client_id = client_ids.get(index).cloned();
            file_infos.push(info);
        }

        tracing::info!(
            files = file_infos.len(),
            user_id = %ctx.user_id,
            "Buffered multipart ingest complete"
        );

        Ok(FileUploadResponse {
            file_infos,
            client_ids,
        })
    }
}

fn parse_channel_id(text: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(text.trim())
        .map_err(|_| AppError::InvalidParam(format!("invalid channel_id: {}", text)))
}

/// Map a parser failure onto the request-error surface.
pub(crate) fn multipart_parse_error(err: multer::Error) -> AppError {
    AppError::InvalidParam(format!("malformed multipart body: {}", err))
}

/// Consume and discard a field's value.
async fn drain_field(mut field: multer::Field<'static>) -> Result<(), AppError> {
    while field.chunk().await.map_err(multipart_parse_error)?.is_some() {}
    Ok(())
}

/// Read a metadata field as UTF-8, bounded by the per-field cap.
async fn read_field_text(
    mut field: multer::Field<'static>,
    cap: usize,
) -> Result<String, AppError> {
    let mut data: Vec<u8> = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_parse_error)? {
        if data.len() + chunk.len() > cap {
            return Err(AppError::InvalidParam(format!(
                "form field exceeds {} bytes",
                cap
            )));
        }
        data.extend_from_slice(&chunk);
    }
    String::from_utf8(data)
        .map_err(|_| AppError::InvalidParam("form field is not valid UTF-8".to_string()))
}

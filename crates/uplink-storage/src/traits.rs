//! Storage abstraction trait
//!
//! This module defines the FileStore trait that all storage backends must
//! implement.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte sink/source for upload sessions.
///
/// The session layer drives resumable uploads through `write_at`: each append
/// lands at the session's current `file_offset` and the reader is consumed to
/// EOF. Backends must make the written range durable before returning so a
/// client that re-queries the offset after a crash resumes from committed
/// bytes only.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write the reader's content into `key` starting at byte `offset`.
    /// Returns the number of bytes written.
    async fn write_at(
        &self,
        key: &str,
        offset: u64,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    /// Read the full content stored under `key`.
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Read the content stored under `key` as a chunk stream (for large files).
    async fn read_stream(
        &self,
        key: &str,
    ) -> StorageResult<Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Size in bytes of the object under `key`.
    async fn size(&self, key: &str) -> StorageResult<u64>;

    /// Delete the object under `key`. Deleting a missing object is not an
    /// error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

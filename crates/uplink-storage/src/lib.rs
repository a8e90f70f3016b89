//! Uplink Storage
//!
//! Blob storage abstraction for upload ingestion. The `FileStore` trait is the
//! "write bytes, read bytes" collaborator the session layer appends through;
//! `LocalFileStore` is the filesystem backend.
//!
//! **Key format:** storage keys are relative, slash-separated paths
//! (`uploads/{session_id}/{filename}`, `import/{session_id}_{filename}`).
//! Keys never contain traversal sequences; backends must reject them.

mod local;
mod traits;

pub use local::LocalFileStore;
pub use traits::{FileStore, StorageError, StorageResult};

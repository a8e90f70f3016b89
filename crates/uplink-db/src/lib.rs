//! Uplink DB
//!
//! Durable stores for upload sessions and file metadata, plus the channel
//! capability lookup. Each store is a trait with a Postgres implementation
//! (dynamic sqlx queries, no offline prepare) and an in-memory implementation
//! used by tests and single-process development setups.

mod access;
mod file_info_store;
mod memory;
mod session_store;

pub use access::{AccessControl, PgAccessControl};
pub use file_info_store::{FileInfoStore, PgFileInfoStore};
pub use memory::{MemoryAccessControl, MemoryFileInfoStore, MemorySessionStore};
pub use session_store::{PgSessionStore, SessionStore};

use uplink_core::AppError;

pub(crate) fn db_err(err: sqlx::Error) -> AppError {
    AppError::Database(err.to_string())
}

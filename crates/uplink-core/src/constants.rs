//! Shared constants

use uuid::{uuid, Uuid};

/// Sentinel creator id recorded on a `FileInfo` when the upload is attached as
/// a channel bookmark rather than user-owned content.
pub const BOOKMARK_FILE_OWNER: Uuid = uuid!("00000000-0000-0000-0000-0000b00cacc7");

/// Storage key prefix for attachment uploads.
pub const UPLOAD_PATH_PREFIX: &str = "uploads";

/// Storage key prefix for bulk-import uploads.
pub const IMPORT_PATH_PREFIX: &str = "import";

//! Domain models

mod file_info;
mod upload_session;

pub use file_info::FileInfo;
pub use upload_session::{UploadSession, UploadType};

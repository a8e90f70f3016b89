//! Uplink API Library
//!
//! This crate provides the HTTP handlers, upload services, middleware, and
//! application setup for the uplink ingestion service.

// Module declarations
mod api_doc;
mod handlers;
mod services;
pub mod setup;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::ErrorResponse;
pub use services::multipart::{BodyStream, FileUploadResponse, MultipartIngest};
pub use services::uploads::{ByteReader, CreateSessionRequest, UploadService};

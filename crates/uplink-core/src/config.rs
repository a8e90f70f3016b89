//! Configuration module
//!
//! Environment-driven configuration for the ingestion service. Values are
//! resolved once at startup and passed into services explicitly so components
//! stay testable without a process-wide fixture.

use std::env;

use crate::AppError;

const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_MAX_FILE_SIZE_BYTES: i64 = 100 * 1024 * 1024;
const DEFAULT_MAX_FORM_FIELD_BYTES: usize = 10 * 1024;
const DEFAULT_PEEK_BUFFER_BYTES: usize = 64 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;

/// Service configuration, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Root directory for the local file store.
    pub storage_path: String,
    /// Hard ceiling for any single uploaded file, in bytes.
    pub max_file_size_bytes: i64,
    /// Per-field ceiling for non-file multipart fields, in bytes.
    pub max_form_field_bytes: usize,
    /// Ceiling for bytes held while classifying a multipart body, in bytes.
    pub peek_buffer_bytes: usize,
    /// Feature flag: whether file attachments are accepted at all.
    pub file_attachments_enabled: bool,
    /// Multi-tenant-isolated deployment; bulk-import sessions are rejected.
    pub cloud: bool,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Internal("DATABASE_URL must be set".to_string()))?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal("JWT_SECRET must be set".to_string()))?;

        Ok(Config {
            server_port: parse_env("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            database_url,
            storage_path: env::var("STORAGE_PATH").unwrap_or_else(|_| "./data".to_string()),
            max_file_size_bytes: parse_env("MAX_FILE_SIZE_BYTES", DEFAULT_MAX_FILE_SIZE_BYTES)?,
            max_form_field_bytes: parse_env(
                "MAX_FORM_FIELD_BYTES",
                DEFAULT_MAX_FORM_FIELD_BYTES,
            )?,
            peek_buffer_bytes: parse_env("PEEK_BUFFER_BYTES", DEFAULT_PEEK_BUFFER_BYTES)?,
            file_attachments_enabled: parse_bool_env("FILE_ATTACHMENTS_ENABLED", true),
            cloud: parse_bool_env("CLOUD_DEPLOYMENT", false),
            jwt_secret,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            db_timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", DEFAULT_DB_TIMEOUT_SECS)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Internal(format!("Invalid value for {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

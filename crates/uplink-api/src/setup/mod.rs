//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from
//! main.rs for better organization and testability.

pub mod database;
pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::Result;
use uplink_core::Config;
use uplink_db::{PgAccessControl, PgFileInfoStore, PgSessionStore};
use uplink_storage::LocalFileStore;

use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let pool = database::setup_database(&config).await?;

    let store = LocalFileStore::new(&config.storage_path).await?;
    tracing::info!(path = %config.storage_path, "File store initialized");

    let state = Arc::new(AppState::new(
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::new(PgFileInfoStore::new(pool.clone())),
        Arc::new(PgAccessControl::new(pool)),
        Arc::new(store),
        config,
    ));

    let router = routes::build_router(state.clone());

    Ok((state, router))
}

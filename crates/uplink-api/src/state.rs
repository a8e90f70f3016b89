//! Application state.
//!
//! AppState aggregates the store trait objects and the upload services so
//! handlers pull everything through one `State<Arc<AppState>>` extractor.
//! Tests construct it over the in-memory store implementations.

use std::sync::Arc;

use uplink_core::Config;
use uplink_db::{AccessControl, FileInfoStore, SessionStore};
use uplink_storage::FileStore;

use crate::services::multipart::MultipartIngest;
use crate::services::uploads::UploadService;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub file_infos: Arc<dyn FileInfoStore>,
    pub access: Arc<dyn AccessControl>,
    pub store: Arc<dyn FileStore>,
    pub uploads: Arc<UploadService>,
    pub ingest: Arc<MultipartIngest>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        file_infos: Arc<dyn FileInfoStore>,
        access: Arc<dyn AccessControl>,
        store: Arc<dyn FileStore>,
        config: Config,
    ) -> Self {
        let uploads = Arc::new(UploadService::new(
            sessions.clone(),
            file_infos.clone(),
            access.clone(),
            store.clone(),
            config.clone(),
        ));
        let ingest = Arc::new(MultipartIngest::new(
            uploads.clone(),
            access.clone(),
            config.clone(),
        ));
        AppState {
            sessions,
            file_infos,
            access,
            store,
            uploads,
            ingest,
            config,
        }
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}

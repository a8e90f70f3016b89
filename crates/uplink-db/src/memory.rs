//! In-memory store implementations.
//!
//! Used by tests and single-process development setups. Conflict semantics
//! mirror the Postgres implementations exactly, compare-and-set included.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uplink_core::{AppError, FileInfo, UploadSession};
use uuid::Uuid;

use crate::{AccessControl, FileInfoStore, SessionStore};

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, UploadSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &UploadSession) -> Result<(), AppError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn advance_offset(
        &self,
        id: Uuid,
        expected: i64,
        new_offset: i64,
    ) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&id) {
            Some(session) if session.file_offset == expected => {
                session.file_offset = new_offset;
                Ok(())
            }
            _ => Err(AppError::ConflictingAppend { expected }),
        }
    }
}

#[derive(Default)]
pub struct MemoryFileInfoStore {
    infos: Mutex<HashMap<Uuid, FileInfo>>,
}

impl MemoryFileInfoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileInfoStore for MemoryFileInfoStore {
    async fn save(&self, info: &FileInfo) -> Result<(), AppError> {
        // Same first-write-wins rule as the Postgres ON CONFLICT DO NOTHING
        self.infos
            .lock()
            .unwrap()
            .entry(info.id)
            .or_insert_with(|| info.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileInfo>, AppError> {
        Ok(self.infos.lock().unwrap().get(&id).cloned())
    }
}

/// Capability check over an explicit membership set.
#[derive(Default)]
pub struct MemoryAccessControl {
    members: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl MemoryAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, user_id: Uuid, channel_id: Uuid) {
        self.members.lock().unwrap().insert((user_id, channel_id));
    }

    pub fn revoke(&self, user_id: Uuid, channel_id: Uuid) {
        self.members.lock().unwrap().remove(&(user_id, channel_id));
    }
}

#[async_trait]
impl AccessControl for MemoryAccessControl {
    async fn can_upload_to_channel(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .contains(&(user_id, channel_id)))
    }
}

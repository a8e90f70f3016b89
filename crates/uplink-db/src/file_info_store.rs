use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uplink_core::{AppError, FileInfo};
use uuid::Uuid;

/// Durable store for completed-upload metadata. A `FileInfo` shares its id
/// with the session that produced it, which is what makes re-completing an
/// already-complete session an idempotent lookup.
#[async_trait]
pub trait FileInfoStore: Send + Sync {
    async fn save(&self, info: &FileInfo) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<FileInfo>, AppError>;
}

/// Postgres-backed file info store
#[derive(Clone)]
pub struct PgFileInfoStore {
    pool: PgPool,
}

impl PgFileInfoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileInfoStore for PgFileInfoStore {
    async fn save(&self, info: &FileInfo) -> Result<(), AppError> {
        // Re-saving under the same id is a no-op; finalize can race with a
        // concurrent idempotent re-complete.
        sqlx::query(
            r#"
            INSERT INTO file_infos (
                id, creator_id, channel_id, create_at, path,
                thumbnail_path, preview_path, name, extension, size,
                mime_type, remote_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(info.id)
        .bind(info.creator_id)
        .bind(info.channel_id)
        .bind(info.create_at)
        .bind(&info.path)
        .bind(&info.thumbnail_path)
        .bind(&info.preview_path)
        .bind(&info.name)
        .bind(&info.extension)
        .bind(info.size)
        .bind(&info.mime_type)
        .bind(&info.remote_id)
        .execute(&self.pool)
        .await
        .map_err(crate::db_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileInfo>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, creator_id, channel_id, create_at, path,
                   thumbnail_path, preview_path, name, extension, size,
                   mime_type, remote_id
            FROM file_infos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::db_err)?;

        Ok(row.map(|row| FileInfo {
            id: row.get("id"),
            creator_id: row.get("creator_id"),
            channel_id: row.get("channel_id"),
            create_at: row.get("create_at"),
            path: row.get("path"),
            thumbnail_path: row.get("thumbnail_path"),
            preview_path: row.get("preview_path"),
            name: row.get("name"),
            extension: row.get("extension"),
            size: row.get("size"),
            mime_type: row.get("mime_type"),
            remote_id: row.get("remote_id"),
            client_id: None,
        }))
    }
}

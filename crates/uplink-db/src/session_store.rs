use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uplink_core::{AppError, UploadSession, UploadType};
use uuid::Uuid;

/// Durable CRUD for upload sessions.
///
/// `advance_offset` is a compare-and-set: it succeeds only when the stored
/// offset still equals `expected`, so two appends racing on one session
/// cannot silently overwrite each other's progress.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &UploadSession) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError>;

    /// Move the session offset from `expected` to `new_offset`. Fails with
    /// `ConflictingAppend` when the stored offset no longer matches.
    async fn advance_offset(
        &self,
        id: Uuid,
        expected: i64,
        new_offset: i64,
    ) -> Result<(), AppError>;
}

/// Postgres-backed session store
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(&self, session: &UploadSession) -> Result<(), AppError> {
        // Dynamic queries to avoid requiring DATABASE_URL/sqlx prepare
        sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                id, upload_type, create_at, user_id, channel_id,
                filename, path, file_size, file_offset, remote_id, req_file_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.id)
        .bind(session.upload_type.as_str())
        .bind(session.create_at)
        .bind(session.user_id)
        .bind(session.channel_id)
        .bind(&session.filename)
        .bind(&session.path)
        .bind(session.file_size)
        .bind(session.file_offset)
        .bind(&session.remote_id)
        .bind(session.req_file_id)
        .execute(&self.pool)
        .await
        .map_err(crate::db_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, upload_type, create_at, user_id, channel_id,
                   filename, path, file_size, file_offset, remote_id, req_file_id
            FROM upload_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::db_err)?;

        row.map(session_from_row).transpose()
    }

    async fn advance_offset(
        &self,
        id: Uuid,
        expected: i64,
        new_offset: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE upload_sessions
            SET file_offset = $3
            WHERE id = $1 AND file_offset = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_offset)
        .execute(&self.pool)
        .await
        .map_err(crate::db_err)?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                session_id = %id,
                expected_offset = expected,
                "Offset advance lost the race, rejecting append"
            );
            return Err(AppError::ConflictingAppend { expected });
        }

        Ok(())
    }
}

fn session_from_row(row: sqlx::postgres::PgRow) -> Result<UploadSession, AppError> {
    let upload_type: String = row.get("upload_type");
    Ok(UploadSession {
        id: row.get("id"),
        upload_type: upload_type.parse::<UploadType>()?,
        create_at: row.get("create_at"),
        user_id: row.get("user_id"),
        channel_id: row.get("channel_id"),
        filename: row.get("filename"),
        path: row.get("path"),
        file_size: row.get("file_size"),
        file_offset: row.get("file_offset"),
        remote_id: row.get("remote_id"),
        req_file_id: row.get("req_file_id"),
    })
}

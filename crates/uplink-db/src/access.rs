use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uplink_core::AppError;
use uuid::Uuid;

/// Channel upload capability check.
///
/// Permission evaluation lives outside the ingestion core; this trait is its
/// interface boundary. Implementations answer one question: may `user_id`
/// attach files to `channel_id` right now. Callers re-ask on every append
/// because membership can change mid-upload.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn can_upload_to_channel(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<bool, AppError>;
}

/// Channel-membership-backed capability check
#[derive(Clone)]
pub struct PgAccessControl {
    pool: PgPool,
}

impl PgAccessControl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessControl for PgAccessControl {
    async fn can_upload_to_channel(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM channel_members
                WHERE user_id = $1 AND channel_id = $2
            ) AS allowed
            "#,
        )
        .bind(user_id)
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await
        .map_err(crate::db_err)?;

        Ok(row.get("allowed"))
    }
}

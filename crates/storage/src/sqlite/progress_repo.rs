use async_trait::async_trait;
use chrono::Utc;
use lab_core::model::ProgressSnapshot;

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row};
use crate::document;
use crate::repository::{ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(&self, key: &str) -> Result<Option<ProgressSnapshot>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save_progress(
        &self,
        key: &str,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        let encoded = document::encode(snapshot)?;
        sqlx::query(
            r"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(encoded)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}

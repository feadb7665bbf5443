use exam_core::model::SessionId;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{answers_from_json, answers_to_json, conn, ser, session_id_to_text};
use crate::repository::{DraftRecord, DraftRepository, StorageError};

#[async_trait::async_trait]
impl DraftRepository for SqliteRepository {
    async fn save_draft(&self, draft: &DraftRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO drafts (session_id, answers_json, saved_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(session_id) DO UPDATE SET
                    answers_json = excluded.answers_json,
                    saved_at = excluded.saved_at
            ",
        )
        .bind(session_id_to_text(draft.session_id))
        .bind(answers_to_json(&draft.answers)?)
        .bind(draft.saved_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn load_draft(&self, session_id: SessionId) -> Result<Option<DraftRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT answers_json, saved_at
                FROM drafts
                WHERE session_id = ?1
            ",
        )
        .bind(session_id_to_text(session_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let answers = answers_from_json(&row.try_get::<String, _>("answers_json").map_err(ser)?)?;
        Ok(Some(DraftRecord {
            session_id,
            answers,
            saved_at: row.try_get("saved_at").map_err(ser)?,
        }))
    }

    async fn clear_draft(&self, session_id: SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM drafts WHERE session_id = ?1")
            .bind(session_id_to_text(session_id))
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}

use exam_core::model::SessionId;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, grading_to_str, map_submission_row, ser, session_id_to_text, trigger_to_str,
};
use crate::repository::{StorageError, SubmissionRecord, SubmissionRepository, SubmissionRow};

#[async_trait::async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn append_submission(&self, record: &SubmissionRecord) -> Result<i64, StorageError> {
        let answers_json = serde_json::to_string(&record.payload.answers).map_err(ser)?;
        let breakdown_json = record
            .breakdown
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ser)?;
        let time_spent = i64::try_from(record.payload.time_spent_seconds)
            .map_err(|_| StorageError::Serialization("time_spent_seconds overflow".into()))?;

        let res = sqlx::query(
            r"
                INSERT INTO submissions (
                    session_id, submitted_at, submit_trigger, grading, time_spent_seconds,
                    answers_json, total_score_percent, breakdown_json
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(session_id_to_text(record.session_id))
        .bind(record.submitted_at)
        .bind(trigger_to_str(record.trigger))
        .bind(grading_to_str(record.grading))
        .bind(time_spent)
        .bind(answers_json)
        .bind(record.breakdown.as_ref().map(|b| b.total_score_percent))
        .bind(breakdown_json)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_submission(&self, id: i64) -> Result<SubmissionRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    session_id, submitted_at, submit_trigger, grading, time_spent_seconds,
                    answers_json, breakdown_json
                FROM submissions
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_submission_row(&row)
    }

    async fn list_submissions(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, submitted_at, submit_trigger, grading, time_spent_seconds,
                    answers_json, breakdown_json
                FROM submissions
                WHERE session_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(session_id_to_text(session_id))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(ser)?;
            out.push(SubmissionRow::new(id, map_submission_row(&row)?));
        }
        Ok(out)
    }
}

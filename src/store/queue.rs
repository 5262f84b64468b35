//! Priority queue persistence (C5, spec §4.5). The atomic claim uses a
//! single `UPDATE ... WHERE id = (SELECT ... FOR UPDATE SKIP LOCKED)
//! RETURNING *` so two workers can never observe the same row, the
//! Postgres-idiomatic replacement for the original CSV row-rewrite lock
//! (noted in DESIGN.md).

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Priority, QueueItem, QueueStatus};
use crate::utils::{ApiResult, StringExt};

use super::Store;

const STUCK_THRESHOLD_SECS: i64 = 60;

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub paused: i64,
    pub by_priority: std::collections::HashMap<String, i64>,
    pub by_source: std::collections::HashMap<String, i64>,
}

impl Store {
    /// Idempotent on `(username, status in {PENDING, PROCESSING})`;
    /// returns `false` without inserting when a non-terminal row already
    /// exists for the username.
    pub async fn enqueue(&self, item: &QueueItem) -> ApiResult<bool> {
        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT request_id FROM queue_items WHERE username = $1 AND status IN ('PENDING', 'PROCESSING')",
        )
        .bind(item.username.normalized_username())
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO queue_items (
                request_id, username, source, priority, status, attempts,
                submitted_at, last_attempt_at, error_message
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            "#,
        )
        .bind(item.request_id)
        .bind(item.username.normalized_username())
        .bind(&item.source)
        .bind(item.priority)
        .bind(item.status)
        .bind(item.attempts)
        .bind(item.submitted_at)
        .bind(item.last_attempt_at)
        .bind(&item.error_message)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    /// Also recovers stuck PROCESSING rows (`last_attempt_at` older than
    /// the configured threshold) back to PENDING before claiming, so a
    /// crashed worker's item becomes eligible again.
    pub async fn claim_next(&self, priority_filter: Option<Priority>) -> ApiResult<Option<QueueItem>> {
        self.recover_stuck_items().await?;

        let priority_clause = match priority_filter {
            Some(Priority::High) => "AND priority = 'HIGH'",
            Some(Priority::Low) => "AND priority = 'LOW'",
            None => "",
        };
        let sql = format!(
            r#"
            UPDATE queue_items
            SET status = 'PROCESSING', last_attempt_at = now(), attempts = attempts + 1
            WHERE request_id = (
                SELECT request_id FROM queue_items
                WHERE status = 'PENDING' {priority_clause}
                ORDER BY priority = 'HIGH' DESC, submitted_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING request_id, username, source, priority, status, attempts,
                      submitted_at, last_attempt_at, error_message
            "#
        );
        let item = sqlx::query_as::<_, QueueItem>(&sql).fetch_optional(&self.pool).await?;
        Ok(item)
    }

    async fn recover_stuck_items(&self) -> ApiResult<()> {
        sqlx::query(
            r#"
            UPDATE queue_items
            SET status = 'PENDING'
            WHERE status = 'PROCESSING'
              AND last_attempt_at < now() - make_interval(secs => $1)
            "#,
        )
        .bind(STUCK_THRESHOLD_SECS as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        request_id: Uuid,
        status: QueueStatus,
        error_message: Option<&str>,
    ) -> ApiResult<()> {
        sqlx::query(
            r#"
            UPDATE queue_items
            SET status = $2,
                error_message = COALESCE($3, error_message)
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent queue row for a username, for `/api/profile/{username}/status`.
    pub async fn latest_queue_item_for_username(&self, username: &str) -> ApiResult<Option<QueueItem>> {
        let item = sqlx::query_as::<_, QueueItem>(
            "SELECT * FROM queue_items WHERE username = $1 ORDER BY submitted_at DESC LIMIT 1",
        )
        .bind(username.normalized_username())
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    pub async fn has_high_pending(&self) -> ApiResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM queue_items WHERE status = 'PENDING' AND priority = 'HIGH'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    pub async fn queue_stats(&self) -> ApiResult<QueueStats> {
        let mut stats = QueueStats::default();
        let counts: Vec<(QueueStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM queue_items GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        for (status, count) in counts {
            match status {
                QueueStatus::Pending => stats.pending = count,
                QueueStatus::Processing => stats.processing = count,
                QueueStatus::Completed => stats.completed = count,
                QueueStatus::Failed => stats.failed = count,
                QueueStatus::Paused => stats.paused = count,
            }
        }

        let by_priority: Vec<(Priority, i64)> =
            sqlx::query_as("SELECT priority, COUNT(*) FROM queue_items GROUP BY priority")
                .fetch_all(&self.pool)
                .await?;
        for (priority, count) in by_priority {
            let label = match priority {
                Priority::High => "HIGH",
                Priority::Low => "LOW",
            };
            stats.by_priority.insert(label.to_string(), count);
        }

        let by_source: Vec<(String, i64)> =
            sqlx::query_as("SELECT source, COUNT(*) FROM queue_items GROUP BY source")
                .fetch_all(&self.pool)
                .await?;
        for (source, count) in by_source {
            stats.by_source.insert(source, count);
        }

        Ok(stats)
    }

    /// Marks every running LOW task's queue row PAUSED (spec §4.6 step 1).
    pub async fn pause_low_items(&self, request_ids: &[Uuid]) -> ApiResult<()> {
        if request_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE queue_items SET status = 'PAUSED' WHERE request_id = ANY($1)")
            .bind(request_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Re-enters PAUSED rows into PENDING, for the worker pool's restart
    /// recovery pass (spec §4.6 graceful-shutdown note).
    pub async fn requeue_paused(&self) -> ApiResult<u64> {
        let result = sqlx::query("UPDATE queue_items SET status = 'PENDING' WHERE status = 'PAUSED'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuck_threshold_matches_spec_default() {
        assert_eq!(STUCK_THRESHOLD_SECS, 60);
    }
}

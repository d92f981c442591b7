//! Outbox Repository

use super::{BaseRepository, RepoError, RepoResult, now_rfc3339};
use crate::db::models::{OutboxMessage, OutboxStatus};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "outbox";

#[derive(Clone)]
pub struct OutboxRepository {
    base: BaseRepository,
}

impl OutboxRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Queue a message for the drainer.
    pub async fn enqueue(
        &self,
        recipient: &str,
        payload: serde_json::Value,
    ) -> RepoResult<OutboxMessage> {
        let now = now_rfc3339();
        let message = OutboxMessage {
            id: None,
            recipient: recipient.to_string(),
            payload,
            status: OutboxStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at: now.clone(),
            updated_at: now,
        };
        let created: Option<OutboxMessage> = self.base.db().create(TABLE).content(message).await?;
        created.ok_or_else(|| RepoError::Database("Failed to enqueue outbox message".to_string()))
    }

    /// Pending messages, oldest first.
    pub async fn pending(&self, limit: u32) -> RepoResult<Vec<OutboxMessage>> {
        let mut result = self
            .base
            .db()
            .query(
                r#"
                SELECT * FROM outbox
                WHERE status = 'pending'
                ORDER BY created_at ASC
                LIMIT $limit
                "#,
            )
            .bind(("limit", limit as i64))
            .await?;
        let rows: Vec<OutboxMessage> = result.take(0)?;
        Ok(rows)
    }

    pub async fn mark_sent(&self, id: &surrealdb::RecordId) -> RepoResult<()> {
        let id = id.clone();
        let now = now_rfc3339();
        self.base
            .db()
            .query("UPDATE $id SET status = 'sent', updated_at = $now")
            .bind(("id", id))
            .bind(("now", now))
            .await?;
        Ok(())
    }

    /// Record a delivery failure. After `max_retries` attempts the message
    /// is parked as failed and never picked up again.
    pub async fn mark_attempt_failed(
        &self,
        id: &surrealdb::RecordId,
        error: &str,
        max_retries: u32,
    ) -> RepoResult<()> {
        let id = id.clone();
        let error = error.to_string();
        let now = now_rfc3339();
        self.base
            .db()
            .query(
                r#"
                UPDATE $id SET
                    retry_count += 1,
                    last_error = $error,
                    status = IF retry_count >= $max THEN 'failed' ELSE 'pending' END,
                    updated_at = $now
                "#,
            )
            .bind(("id", id))
            .bind(("error", error))
            .bind(("max", max_retries as i64))
            .bind(("now", now))
            .await?;
        Ok(())
    }
}

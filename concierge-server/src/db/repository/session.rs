//! Session Repository
//!
//! Per-field conversation state with sliding expiry. A field written 23h ago
//! and touched again now lives another full TTL; an untouched field simply
//! stops being returned and is physically removed by the purge task.

use super::{BaseRepository, RepoResult, now_rfc3339};
use crate::db::models::{Session, SessionField};
use chrono::{DateTime, Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct SessionRepository {
    base: BaseRepository,
}

impl SessionRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    async fn find(&self, session_key: &str) -> RepoResult<Option<Session>> {
        let key = session_key.to_string();
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM session WHERE session_key = $key LIMIT 1")
            .bind(("key", key))
            .await?;
        let rows: Vec<Session> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Read one field, applying the TTL. Expired fields read as absent.
    pub async fn get_field(
        &self,
        session_key: &str,
        field: &str,
        ttl_hours: i64,
    ) -> RepoResult<Option<serde_json::Value>> {
        let Some(session) = self.find(session_key).await? else {
            return Ok(None);
        };
        let Some(entry) = session.fields.get(field) else {
            return Ok(None);
        };
        if is_expired(&entry.updated_at, ttl_hours) {
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    /// Write one field, refreshing its timestamp. Creates the session
    /// record on first use.
    pub async fn set_field(
        &self,
        session_key: &str,
        field: &str,
        value: serde_json::Value,
    ) -> RepoResult<()> {
        let key = session_key.to_string();
        let entry = SessionField {
            value,
            updated_at: now_rfc3339(),
        };
        self.base
            .db()
            .query(
                r#"
                UPSERT session SET
                    session_key = $key,
                    fields[$field] = $entry
                WHERE session_key = $key
                "#,
            )
            .bind(("key", key))
            .bind(("field", field.to_string()))
            .bind(("entry", entry))
            .await?;
        Ok(())
    }

    pub async fn delete_field(&self, session_key: &str, field: &str) -> RepoResult<()> {
        let key = session_key.to_string();
        self.base
            .db()
            .query(
                r#"
                UPDATE session SET fields[$field] = NONE
                WHERE session_key = $key
                "#,
            )
            .bind(("key", key))
            .bind(("field", field.to_string()))
            .await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_key: &str) -> RepoResult<()> {
        let key = session_key.to_string();
        self.base
            .db()
            .query("DELETE session WHERE session_key = $key")
            .bind(("key", key))
            .await?;
        Ok(())
    }

    /// Remove expired fields and drop sessions left empty. Returns the
    /// number of sessions touched.
    pub async fn purge_expired(&self, ttl_hours: i64) -> RepoResult<usize> {
        let mut result = self.base.db().query("SELECT * FROM session").await?;
        let sessions: Vec<Session> = result.take(0)?;

        let mut touched = 0;
        for session in sessions {
            let expired: Vec<&str> = session
                .fields
                .iter()
                .filter(|(_, f)| is_expired(&f.updated_at, ttl_hours))
                .map(|(name, _)| name.as_str())
                .collect();
            if expired.is_empty() {
                continue;
            }
            touched += 1;
            if expired.len() == session.fields.len() {
                self.delete_session(&session.session_key).await?;
            } else {
                for field in expired {
                    self.delete_field(&session.session_key, field).await?;
                }
            }
        }
        Ok(touched)
    }
}

fn is_expired(updated_at: &str, ttl_hours: i64) -> bool {
    match DateTime::parse_from_rfc3339(updated_at) {
        Ok(ts) => ts.with_timezone(&Utc) + Duration::hours(ttl_hours) < Utc::now(),
        // Unparseable timestamps are treated as expired and purged
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_field_is_not_expired() {
        assert!(!is_expired(&now_rfc3339(), 24));
    }

    #[test]
    fn old_field_is_expired() {
        let old = (Utc::now() - Duration::hours(25)).to_rfc3339();
        assert!(is_expired(&old, 24));
    }

    #[test]
    fn garbage_timestamp_is_expired() {
        assert!(is_expired("not-a-date", 24));
    }
}

//! Outbox Model
//!
//! Durable queue for persistent-channel messages. Messages are written here
//! first and drained by a background loop so a messaging-API outage never
//! loses a notification.

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub recipient: String,
    /// Full messaging-API request body
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    #[serde(default)]
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

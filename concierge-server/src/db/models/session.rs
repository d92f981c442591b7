//! Session Model
//!
//! Conversation scratch state keyed by guest identity. Each field carries
//! its own write timestamp so expiry slides per field, not per session.

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use surrealdb::RecordId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// Guest identity (messaging digits or web session UUID)
    pub session_key: String,
    #[serde(default)]
    pub fields: HashMap<String, SessionField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionField {
    pub value: serde_json::Value,
    /// RFC3339, refreshed on every write
    pub updated_at: String,
}

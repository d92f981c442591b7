//! Promo Code Model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoKind {
    Percentage,
    Fixed,
}

/// A discount code. Codes are stored upper-cased and matched exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub code: String,
    pub kind: PromoKind,
    /// Percent (0..=100) for percentage codes, IDR amount for fixed codes
    pub value: f64,
    pub active: bool,
    /// RFC3339; None = never expires
    pub expiry: Option<String>,
    /// None = unlimited
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub current_usage: u32,
}

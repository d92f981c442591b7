//! Promo Code Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{PromoCode, PromoKind};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "promo_code";

#[derive(Clone)]
pub struct PromoRepository {
    base: BaseRepository,
}

impl PromoRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Look up a code. Matching is case-insensitive; codes are stored
    /// upper-cased.
    pub async fn find_by_code(&self, code: &str) -> RepoResult<Option<PromoCode>> {
        let code = code.trim().to_uppercase();
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM promo_code WHERE code = $code LIMIT 1")
            .bind(("code", code))
            .await?;
        let rows: Vec<PromoCode> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Create a code (admin/seed path).
    pub async fn create(
        &self,
        code: &str,
        kind: PromoKind,
        value: f64,
        expiry: Option<String>,
        usage_limit: Option<u32>,
    ) -> RepoResult<PromoCode> {
        let promo = PromoCode {
            id: None,
            code: code.trim().to_uppercase(),
            kind,
            value,
            active: true,
            expiry,
            usage_limit,
            current_usage: 0,
        };
        let created: Option<PromoCode> = self
            .base
            .db()
            .create(TABLE)
            .content(promo)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("uniq_promo_code") {
                    RepoError::Duplicate(format!("Promo code {} already exists", code))
                } else {
                    RepoError::Database(msg)
                }
            })?;
        created.ok_or_else(|| RepoError::Database("Failed to create promo code".to_string()))
    }

    /// Count one redemption. Guarded so the counter never exceeds the limit
    /// even under concurrent redemptions.
    pub async fn increment_usage(&self, code: &str) -> RepoResult<bool> {
        let code = code.trim().to_uppercase();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE promo_code SET current_usage += 1
                WHERE code = $code
                  AND (usage_limit = NONE OR current_usage < usage_limit)
                RETURN AFTER
                "#,
            )
            .bind(("code", code))
            .await?;
        let rows: Vec<PromoCode> = result.take(0)?;
        Ok(!rows.is_empty())
    }
}

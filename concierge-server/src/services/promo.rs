//! Promo Code Service
//!
//! Validates codes against activation, expiry and usage limits, and
//! computes the discounted amount. An invalid code is always a visible
//! error for the guest, never a silent full-price order.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::models::{PromoCode, PromoKind};
use crate::db::repository::PromoRepository;
use crate::utils::{AppError, AppResult};

/// Result of applying a promo code to a base amount.
#[derive(Debug, Clone, PartialEq)]
pub struct PromoQuote {
    pub final_amount: u64,
    pub discount: u64,
    pub message: String,
}

#[derive(Clone)]
pub struct PromoService {
    repo: PromoRepository,
}

impl PromoService {
    pub fn new(repo: PromoRepository) -> Self {
        Self { repo }
    }

    /// Validate a code against a base amount in whole IDR.
    pub async fn validate(&self, code: &str, base_amount: u64) -> AppResult<PromoQuote> {
        let promo = self
            .repo
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::validation(format!("Promo code '{}' not found", code)))?;
        let quote = apply_promo(&promo, base_amount)?;
        info!(
            target: "promo",
            code = %promo.code,
            discount = quote.discount,
            final_amount = quote.final_amount,
            "Promo code applied"
        );
        Ok(quote)
    }

    /// Count a redemption once the order has bound the code. Returns
    /// Conflict if the limit was exhausted between validation and binding.
    pub async fn increment_usage(&self, code: &str) -> AppResult<()> {
        if self.repo.increment_usage(code).await? {
            Ok(())
        } else {
            Err(AppError::conflict(format!(
                "Promo code '{}' usage limit reached",
                code
            )))
        }
    }
}

fn apply_promo(promo: &PromoCode, base_amount: u64) -> AppResult<PromoQuote> {
    if !promo.active {
        return Err(AppError::validation(format!(
            "Promo code '{}' is no longer active",
            promo.code
        )));
    }
    if let Some(expiry) = &promo.expiry {
        let expires = DateTime::parse_from_rfc3339(expiry)
            .map_err(|_| AppError::internal(format!("Promo '{}' has a malformed expiry", promo.code)))?;
        if expires.with_timezone(&Utc) < Utc::now() {
            return Err(AppError::validation(format!(
                "Promo code '{}' has expired",
                promo.code
            )));
        }
    }
    if let Some(limit) = promo.usage_limit
        && promo.current_usage >= limit
    {
        return Err(AppError::validation(format!(
            "Promo code '{}' usage limit reached",
            promo.code
        )));
    }

    let discount = match promo.kind {
        PromoKind::Percentage => {
            let pct = promo.value.clamp(0.0, 100.0);
            ((base_amount as f64) * pct / 100.0).round() as u64
        }
        PromoKind::Fixed => (promo.value.max(0.0).round() as u64).min(base_amount),
    };

    Ok(PromoQuote {
        final_amount: base_amount - discount,
        discount,
        message: match promo.kind {
            PromoKind::Percentage => format!("{}% off applied", promo.value),
            PromoKind::Fixed => format!("Rp {} off applied", discount),
        },
    })
}

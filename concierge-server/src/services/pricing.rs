//! Pricing & Distribution Resolver
//!
//! The service catalog, per-service pricing, the provider/villa split and
//! payout bank details all live in an external menu service. This module
//! is the only place that knows its endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::db::models::BankDetails;
use crate::utils::{AppError, AppResult};

/// One bookable service as shown to the guest.
#[derive(Debug, Clone, Default)]
pub struct ServiceListing {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display string, e.g. "Rp 250,000"
    pub price_display: String,
}

/// How one paid booking splits between the two payout parties.
#[derive(Debug, Clone, Copy)]
pub struct PriceDistribution {
    pub service_provider_price: u64,
    pub villa_price: u64,
}

#[async_trait]
pub trait PricingResolver: Send + Sync {
    async fn list_services(&self) -> AppResult<Vec<ServiceListing>>;

    /// Base display price for a service.
    async fn base_price(&self, service: &str) -> AppResult<String>;

    async fn price_distribution(&self, service: &str) -> AppResult<PriceDistribution>;

    async fn provider_bank(&self, code: &str) -> AppResult<Option<BankDetails>>;

    async fn villa_bank(&self, code: &str) -> AppResult<Option<BankDetails>>;

    /// Phone identities of every provider offering the service.
    async fn providers_for(&self, service: &str) -> AppResult<Vec<String>>;
}

/// Reduce a display price to whole IDR.
///
/// Strips everything but digits: "Rp 250,000" becomes 250000. A string with
/// no digits at all is a validation error; money fields are never defaulted.
pub fn clean_price_string(price: &str) -> AppResult<u64> {
    let digits: String = price.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(AppError::validation(format!(
            "No digits found in price string: '{}'",
            price
        )));
    }
    digits
        .parse::<u64>()
        .map_err(|_| AppError::validation(format!("Price out of range: '{}'", price)))
}

// ========== HTTP implementation ==========

#[derive(Debug, Deserialize)]
struct ServiceListingWire {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    /// The menu service calls the display price "metadata"
    #[serde(default)]
    metadata: String,
}

#[derive(Debug, Deserialize)]
struct PriceDistributionWire {
    service_provider_price: String,
    villa_price: String,
}

#[derive(Debug, Deserialize)]
struct BankDetailsWire {
    bank_code: String,
    account_number: String,
    account_name: String,
}

impl From<BankDetailsWire> for BankDetails {
    fn from(w: BankDetailsWire) -> Self {
        BankDetails {
            bank_code: w.bank_code,
            account_number: w.account_number,
            account_holder_name: w.account_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BasePriceWire {
    price: String,
}

#[derive(Debug, Deserialize)]
struct ProvidersWire {
    providers: Vec<String>,
}

/// Resolver backed by the menu service HTTP API.
#[derive(Clone)]
pub struct HttpPricingResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPricingResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(target: "pricing", %url, "Menu service request");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Menu service unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "Menu service returned {} for {}",
                response.status(),
                path
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid menu service response: {}", e)))
    }
}

#[async_trait]
impl PricingResolver for HttpPricingResolver {
    async fn list_services(&self) -> AppResult<Vec<ServiceListing>> {
        let wire: Vec<ServiceListingWire> = self.get_json("/menu/services", &[]).await?;
        Ok(wire
            .into_iter()
            .map(|s| ServiceListing {
                id: s.id,
                title: s.title,
                description: s.description,
                price_display: s.metadata,
            })
            .collect())
    }

    async fn base_price(&self, service: &str) -> AppResult<String> {
        let wire: BasePriceWire = self
            .get_json("/menu/price", &[("service_item", service)])
            .await?;
        Ok(wire.price)
    }

    async fn price_distribution(&self, service: &str) -> AppResult<PriceDistribution> {
        let wire: PriceDistributionWire = self
            .get_json("/menu/price_distribution", &[("service_item", service)])
            .await?;
        Ok(PriceDistribution {
            service_provider_price: clean_price_string(&wire.service_provider_price)?,
            villa_price: clean_price_string(&wire.villa_price)?,
        })
    }

    async fn provider_bank(&self, code: &str) -> AppResult<Option<BankDetails>> {
        let wire: Option<BankDetailsWire> = self
            .get_json("/menu/service-provider-bank", &[("provider_code", code)])
            .await?;
        Ok(wire.map(BankDetails::from))
    }

    async fn villa_bank(&self, code: &str) -> AppResult<Option<BankDetails>> {
        let wire: Option<BankDetailsWire> = self
            .get_json("/menu/villa-bank", &[("provider_code", code)])
            .await?;
        Ok(wire.map(BankDetails::from))
    }

    async fn providers_for(&self, service: &str) -> AppResult<Vec<String>> {
        let wire: ProvidersWire = self
            .get_json("/menu/service-providers", &[("service_item", service)])
            .await?;
        Ok(wire.providers)
    }
}

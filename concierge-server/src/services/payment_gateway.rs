//! Payment Gateway Adapter
//!
//! Hosted invoices and bank disbursements against the payment provider's
//! REST API. Everything money-related funnels through the `PaymentGateway`
//! trait so the lifecycle is testable without the network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::db::models::BankDetails;
use crate::utils::{RetryPolicy, Transient};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request timed out")]
    Timeout,

    #[error("Gateway network error: {0}")]
    Network(String),

    /// The provider answered with a non-2xx status. Not retried: the
    /// request itself was wrong or refused.
    #[error("Gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl Transient for GatewayError {
    fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Network(_))
    }
}

impl From<GatewayError> for crate::utils::AppError {
    fn from(e: GatewayError) -> Self {
        crate::utils::AppError::Gateway(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceLineItem {
    pub name: String,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    /// `booking_<order_number>_<unix_ts>`; comes back on the webhook
    pub external_id: String,
    pub amount: f64,
    pub description: String,
    pub customer_phone: String,
    pub duration_secs: u64,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    pub items: Vec<InvoiceLineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceResponse {
    pub invoice_id: String,
    pub payment_url: String,
    pub expires_at: String,
}

#[derive(Debug, Clone)]
pub struct DisbursementRequest {
    /// Also the idempotency key: `sp_<order>` or `villa_<order>`
    pub reference_id: String,
    /// Whole IDR, no decimals
    pub amount: u64,
    pub bank: BankDetails,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisbursementResponse {
    pub disbursement_id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted invoice the guest can pay.
    async fn create_invoice(&self, req: InvoiceRequest) -> Result<InvoiceResponse, GatewayError>;

    /// Send one payout leg. Idempotent per reference id on the provider
    /// side, so a retried request can never pay twice.
    async fn create_disbursement(
        &self,
        req: DisbursementRequest,
    ) -> Result<DisbursementResponse, GatewayError>;
}

// ========== HTTP implementation ==========

#[derive(Debug, Deserialize)]
struct InvoiceWire {
    id: String,
    invoice_url: String,
    expiry_date: String,
}

#[derive(Debug, Deserialize)]
struct DisbursementWire {
    id: String,
    status: String,
}

/// Gateway client. Basic auth with the secret key as username and an empty
/// password, as the provider's API requires.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
    retry: RetryPolicy,
}

impl HttpPaymentGateway {
    pub fn new(
        api_url: impl Into<String>,
        secret_key: impl Into<String>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: api_url.into(),
            secret_key: secret_key.into(),
            retry,
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, Some(""))
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header("X-IDEMPOTENCY-KEY", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_invoice(&self, req: InvoiceRequest) -> Result<InvoiceResponse, GatewayError> {
        let body = json!({
            "external_id": req.external_id,
            "amount": req.amount,
            "currency": "IDR",
            "invoice_duration": req.duration_secs,
            "description": req.description,
            "customer": {
                "given_names": "Customer",
                "mobile_number": req.customer_phone,
            },
            "success_redirect_url": req.success_redirect_url,
            "failure_redirect_url": req.failure_redirect_url,
            "items": req.items,
        });

        let wire: InvoiceWire = self
            .retry
            .run("create_invoice", || self.post_json("/v2/invoices", &body, None))
            .await?;

        info!(
            target: "gateway",
            invoice_id = %wire.id,
            external_id = %req.external_id,
            "Invoice created"
        );
        Ok(InvoiceResponse {
            invoice_id: wire.id,
            payment_url: wire.invoice_url,
            expires_at: wire.expiry_date,
        })
    }

    async fn create_disbursement(
        &self,
        req: DisbursementRequest,
    ) -> Result<DisbursementResponse, GatewayError> {
        let body = json!({
            "external_id": req.reference_id,
            "amount": req.amount,
            "bank_code": req.bank.bank_code,
            "account_holder_name": req.bank.account_holder_name,
            "account_number": req.bank.account_number,
            "description": req.description,
        });

        let wire: DisbursementWire = self
            .retry
            .run("create_disbursement", || {
                self.post_json("/disbursements", &body, Some(&req.reference_id))
            })
            .await?;

        info!(
            target: "gateway",
            disbursement_id = %wire.id,
            reference_id = %req.reference_id,
            status = %wire.status,
            "Disbursement created"
        );
        Ok(DisbursementResponse {
            disbursement_id: wire.id,
            status: wire.status,
        })
    }
}

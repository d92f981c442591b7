//! Booking Model
//!
//! Document-model booking record (`booking` table). The payment sub-record
//! and its disbursement history live embedded in the document; there is no
//! separate payments table.

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use shared::{OrderStatus, PaymentStatus};
use surrealdb::RecordId;

/// A guest booking, from creation through claim, payment and payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// Unique, monotonic `EB<n>` number issued by the sequence generator
    pub order_number: String,
    /// Guest identity: messaging-platform digits or a web session UUID
    pub sender_id: String,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub service_name: String,
    /// Provider code, bound at claim time
    pub service_provider_code: Option<String>,
    pub villa_code: Option<String>,
    /// Final display price (promo applied), digits-only IDR string
    pub price: String,
    /// Pre-promo price, kept for the invoice
    pub original_price: Option<String>,
    #[serde(default)]
    pub discount_amount: f64,
    pub promo_code: Option<String>,
    pub booking_date: Option<String>,
    pub booking_time: Option<String>,
    pub person_count: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub confirmation: bool,
    /// Absence of this field is the claim guard
    pub confirmed_by_provider: Option<String>,
    pub confirmed_at: Option<String>,
    /// Every provider who declined, including declines after a claim
    #[serde(default)]
    pub declined_by: Vec<String>,
    #[serde(default)]
    pub payment: PaymentInfo,
    pub invoice: Option<InvoiceRecord>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<String>,
    #[serde(default)]
    pub reminder_sent: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Parameters for creating a booking. The repository assigns the order
/// number, timestamps and initial status.
#[derive(Debug, Clone, Default)]
pub struct BookingCreate {
    pub sender_id: String,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub service_name: String,
    pub villa_code: Option<String>,
    pub price: String,
    pub original_price: Option<String>,
    pub discount_amount: f64,
    pub promo_code: Option<String>,
    pub booking_date: Option<String>,
    pub booking_time: Option<String>,
    pub person_count: Option<String>,
}

/// Embedded payment sub-record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub invoice_id: Option<String>,
    pub payment_url: Option<String>,
    /// Gateway correlation id, `booking_<order_number>_<unix_ts>`
    pub external_id: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
    pub method: Option<String>,
    pub amount: Option<f64>,
    pub paid_at: Option<String>,
    pub expires_at: Option<String>,
    pub expired_at: Option<String>,
    pub failed_at: Option<String>,
    pub failure_reason: Option<String>,
    pub distribution_data: Option<DistributionData>,
    #[serde(default)]
    pub disbursements: Vec<DisbursementRecord>,
    pub distribution_error: Option<String>,
}

/// Split payout plan, computed once when the invoice is created.
///
/// Invariant: `total_distribution = service_provider.amount + villa.amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionData {
    pub service_provider: PartyShare,
    pub villa: PartyShare,
    pub total_distribution: f64,
}

/// One payout leg: amount plus the destination bank details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyShare {
    pub amount: f64,
    pub bank: BankDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_code: String,
    pub account_number: String,
    pub account_holder_name: String,
}

/// Result of one disbursement call, recorded for reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisbursementRecord {
    /// "service_provider" or "villa"
    pub party: String,
    pub disbursement_id: String,
    /// Also the gateway idempotency key (`sp_<order>` / `villa_<order>`)
    pub reference_id: String,
    pub amount: f64,
    pub status: String,
    pub created_at: String,
}

/// Invoice snapshot persisted after a successful payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// `INV-<order_number>`
    pub invoice_number: String,
    pub download_url: String,
    pub generated_at: String,
    /// Structured line items / totals as rendered
    pub snapshot: serde_json::Value,
}

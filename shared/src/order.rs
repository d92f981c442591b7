//! Order lifecycle types shared between server and clients

use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall booking status.
///
/// Transitions are driven exclusively by the server-side lifecycle
/// orchestrator; clients only ever read this field.
///
/// ```text
/// pending --(claim wins)--> payment_pending --(PAID)--> payment_completed
///                                           --(EXPIRED)--> payment_expired
///                                           --(FAILED)--> payment_failed
/// payment_completed --(payout ok)--> funds_distributed
/// payment_completed --(payout err)--> distribution_failed
/// payment_expired | payment_failed --(guest retry)--> payment_pending
/// pending | payment_pending --(cancel)--> cancelled
/// pending --(all providers decline)--> declined
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, waiting for a provider to claim it
    #[default]
    Pending,
    /// Claimed; payment link issued, waiting for the guest to pay
    PaymentPending,
    /// Gateway confirmed funds received
    PaymentCompleted,
    /// Both payout legs settled
    FundsDistributed,
    /// Funds received but a payout leg failed; needs manual reconciliation
    DistributionFailed,
    /// Invoice expired unpaid (guest may retry)
    PaymentExpired,
    /// Gateway reported the payment attempt failed (guest may retry)
    PaymentFailed,
    /// Provider declined before anyone claimed it
    Declined,
    /// Cancelled before payment completed
    Cancelled,
}

impl OrderStatus {
    /// Serialized form, as stored in the database status field.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::PaymentCompleted => "payment_completed",
            OrderStatus::FundsDistributed => "funds_distributed",
            OrderStatus::DistributionFailed => "distribution_failed",
            OrderStatus::PaymentExpired => "payment_expired",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Declined => "declined",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Funds have been received. Once true, the status never moves back to
    /// a pre-payment state regardless of late or duplicated gateway events.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentCompleted
                | OrderStatus::FundsDistributed
                | OrderStatus::DistributionFailed
        )
    }

    /// The guest may request a fresh payment link from this state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderStatus::PaymentExpired | OrderStatus::PaymentFailed)
    }

    /// Cancellation is allowed only before funds are received.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PaymentPending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the payment sub-record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Completed,
    Expired,
    Failed,
}

/// Result of a provider attempting to claim an order.
///
/// Exactly one provider can ever receive `Won`; every later attempt gets
/// `AlreadyClaimed` with the winner's identity so the losing provider can be
/// given a specific explanation instead of a generic error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Won,
    AlreadyClaimed { by: String },
    NotFound,
}

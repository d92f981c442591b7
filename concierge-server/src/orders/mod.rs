//! Order Lifecycle Module
//!
//! Orchestrates a booking from creation through the provider claim race,
//! payment, split disbursement and invoicing.

pub mod lifecycle;

pub use lifecycle::{CreateOrderRequest, OrderLifecycle};

/// A normalized payment-gateway webhook event.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub order_number: String,
    pub status: PaymentEventStatus,
    pub method: Option<String>,
    pub amount: Option<f64>,
    pub paid_at: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventStatus {
    Paid,
    Expired,
    Failed,
}

/// Extract the order number from a gateway external id.
///
/// External ids are issued as `booking_<order_number>_<unix_ts>`; anything
/// else is a foreign or malformed correlation id and yields `None`.
pub fn parse_external_id(external_id: &str) -> Option<&str> {
    let mut parts = external_id.split('_');
    if parts.next() != Some("booking") {
        return None;
    }
    let order_number = parts.next().filter(|s| !s.is_empty())?;
    // Trailing part is the issuance timestamp
    parts.next()?;
    Some(order_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_external_id_parses() {
        assert_eq!(parse_external_id("booking_EB42_1735689600"), Some("EB42"));
    }

    #[test]
    fn foreign_prefixes_are_rejected() {
        assert_eq!(parse_external_id("invoice_EB42_1735689600"), None);
        assert_eq!(parse_external_id("sp_EB42"), None);
    }

    #[test]
    fn truncated_ids_are_rejected() {
        assert_eq!(parse_external_id("booking_EB42"), None);
        assert_eq!(parse_external_id("booking__123"), None);
        assert_eq!(parse_external_id(""), None);
    }
}

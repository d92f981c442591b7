//! Database Models

// Serde helpers
pub mod serde_helpers;

// Bookings
pub mod order;

// Marketing
pub mod promo;

// Conversation state
pub mod session;

// Messaging
pub mod outbox;

// Re-exports
pub use order::{
    BankDetails, Booking, BookingCreate, DisbursementRecord, DistributionData, InvoiceRecord,
    PartyShare, PaymentInfo,
};
pub use outbox::{OutboxMessage, OutboxStatus};
pub use promo::{PromoCode, PromoKind};
pub use session::{Session, SessionField};

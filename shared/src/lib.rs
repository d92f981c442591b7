//! Shared types for the concierge platform
//!
//! Types used by the booking server and its clients (web chat widget,
//! operator dashboard): order status enums, the live-channel message
//! envelope, and machine-readable API error codes.

pub mod error;
pub mod message;
pub mod order;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::ErrorCode;
pub use message::{ChannelMessage, MessageKind};
pub use order::{ClaimOutcome, OrderStatus, PaymentStatus};

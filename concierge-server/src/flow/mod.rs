//! Encrypted Flow Channel
//!
//! End-to-end encrypted interactive booking forms: envelope crypto plus the
//! screen state machine behind it.

pub mod crypto;
pub mod handler;

pub use crypto::{FlowCrypto, FlowCryptoError, FlowExchange};
pub use handler::FlowHandler;

//! Utility module - shared helpers and types
//!
//! - [`AppError`] - application error type with HTTP mapping
//! - [`RetryPolicy`] - bounded exponential backoff for transient faults
//! - logging setup

pub mod error;
pub mod logger;
pub mod retry;

pub use error::{AppError, AppResult};
pub use retry::{RetryPolicy, Transient};

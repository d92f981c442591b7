//! Notification Module
//!
//! Channel-aware guest/provider notification: live connection registry plus
//! the router that chooses between persistent and transient delivery.

pub mod connections;
pub mod router;

pub use connections::{ConnectionManager, ConnectionSender};
pub use router::{Channel, NotificationRouter, detect_channel};

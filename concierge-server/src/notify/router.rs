//! Notification Router
//!
//! Single entry point for telling a guest anything. Picks the delivery
//! channel from the recipient identity and hides the difference between a
//! durable messaging-platform send and a live WebSocket frame.

use serde_json::Value;
use shared::ChannelMessage;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::ConnectionManager;
use crate::services::whatsapp::{self, OutboxService};
use crate::utils::AppResult;

/// How long the guest gets to read the final message before the transient
/// channel is torn down.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Messaging platform; survives the conversation.
    Persistent,
    /// Live WebSocket session; gone when the widget closes.
    Transient,
}

/// Classify a recipient identity.
///
/// Phone-number identities are all digits; web sessions are UUIDs. This
/// heuristic would misroute an all-numeric web session id, but session ids
/// are generated server-side so that shape never occurs.
pub fn detect_channel(recipient: &str) -> Channel {
    if !recipient.is_empty() && recipient.bytes().all(|b| b.is_ascii_digit()) {
        Channel::Persistent
    } else {
        Channel::Transient
    }
}

#[derive(Clone)]
pub struct NotificationRouter {
    connections: Arc<ConnectionManager>,
    outbox: OutboxService,
}

impl NotificationRouter {
    pub fn new(connections: Arc<ConnectionManager>, outbox: OutboxService) -> Self {
        Self {
            connections,
            outbox,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Deliver a message over whichever channel the recipient lives on.
    ///
    /// Persistent sends are queued durably; transient sends go to the live
    /// session or its pending queue. Neither path fails for an offline
    /// recipient.
    pub async fn send(&self, recipient: &str, message: ChannelMessage) -> AppResult<()> {
        match detect_channel(recipient) {
            Channel::Persistent => {
                let payload = whatsapp::text_message(recipient, &message.message);
                self.outbox.enqueue(recipient, payload).await
            }
            Channel::Transient => {
                self.connections.send(recipient, message);
                Ok(())
            }
        }
    }

    /// Queue a raw platform payload (buttons, CTA links, flow launches).
    /// Persistent channel only; transient recipients get the plain text
    /// fallback instead.
    pub async fn send_payload(
        &self,
        recipient: &str,
        payload: Value,
        fallback: ChannelMessage,
    ) -> AppResult<()> {
        match detect_channel(recipient) {
            Channel::Persistent => self.outbox.enqueue(recipient, payload).await,
            Channel::Transient => {
                self.connections.send(recipient, fallback);
                Ok(())
            }
        }
    }

    /// Send a final message to a transient session, then tear it down.
    ///
    /// The destroy frame trails the message by a short grace period so the
    /// client renders the content before closing. No-op on persistent
    /// recipients, whose channel has nothing to close.
    pub async fn close_after(&self, recipient: &str, final_message: ChannelMessage) {
        if detect_channel(recipient) == Channel::Persistent {
            return;
        }
        self.connections.send(recipient, final_message);
        tokio::time::sleep(CLOSE_GRACE).await;
        self.connections.send(recipient, ChannelMessage::destroy());
        debug!(target: "notify", recipient, "Transient session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_identities_are_persistent() {
        assert_eq!(detect_channel("6281234567890"), Channel::Persistent);
        assert_eq!(detect_channel("15551234567"), Channel::Persistent);
    }

    #[test]
    fn uuid_identities_are_transient() {
        assert_eq!(
            detect_channel("550e8400-e29b-41d4-a716-446655440000"),
            Channel::Transient
        );
        assert_eq!(detect_channel("web-session-1"), Channel::Transient);
    }

    #[test]
    fn empty_identity_is_transient() {
        assert_eq!(detect_channel(""), Channel::Transient);
    }
}

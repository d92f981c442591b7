//! Live-channel message envelope
//!
//! Frames sent over a transient (WebSocket) guest session. The shape is
//! `{"type": ..., "message": ...}` and is part of the widget protocol, so the
//! serialized field names must not change.

use serde::{Deserialize, Serialize};

/// Discriminator for live-channel frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Ordinary conversational text
    BotMessage,
    /// Text that embeds a markdown-style payment link
    LinkMessage,
    /// Invoice ready, download link included
    Invoice,
    /// Payment link expired
    PaymentExpired,
    /// Payment attempt failed
    PaymentFailed,
    /// Recoverable error shown to the guest
    Error,
    /// Final frame: client should close the connection after rendering
    /// whatever arrived before it
    Destroy,
}

/// One frame on the transient channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
}

impl ChannelMessage {
    pub fn new(kind: MessageKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn text(message: impl Into<String>) -> Self {
        Self::new(MessageKind::BotMessage, message)
    }

    pub fn link(message: impl Into<String>, url: &str) -> Self {
        Self::new(MessageKind::LinkMessage, format!("{}\n[link]({url})", message.into()))
    }

    /// The empty-bodied teardown frame.
    pub fn destroy() -> Self {
        Self::new(MessageKind::Destroy, "")
    }

    /// Serialize for the wire. The envelope is plain JSON text.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).expect("channel message serialization cannot fail")
    }
}

//! Live Connection Registry
//!
//! One shared registry of transient-channel (WebSocket) sessions. Messages
//! for a session that is offline are queued in FIFO order and flushed the
//! moment the session reconnects, before any new traffic.

use dashmap::DashMap;
use shared::ChannelMessage;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outbound half of one live connection. The socket task owns the receiver
/// and writes frames to the wire.
pub type ConnectionSender = mpsc::UnboundedSender<ChannelMessage>;

#[derive(Default)]
pub struct ConnectionManager {
    active: DashMap<String, ConnectionSender>,
    pending: DashMap<String, VecDeque<ChannelMessage>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Queued messages are flushed into the new
    /// connection in arrival order before this returns.
    pub fn connect(&self, session_id: &str, sender: ConnectionSender) {
        if let Some((_, queued)) = self.pending.remove(session_id) {
            let count = queued.len();
            for message in queued {
                // A send failure here means the socket died immediately;
                // the messages are gone with it, same as a mid-flush drop.
                let _ = sender.send(message);
            }
            if count > 0 {
                debug!(target: "connections", session_id, count, "Flushed pending messages");
            }
        }
        self.active.insert(session_id.to_string(), sender);
        info!(target: "connections", session_id, total = self.active.len(), "Session connected");
    }

    pub fn disconnect(&self, session_id: &str) {
        if self.active.remove(session_id).is_some() {
            info!(target: "connections", session_id, total = self.active.len(), "Session disconnected");
        }
    }

    /// Deliver to a session, queueing if it is offline or its channel is
    /// closed. Returns true only on live delivery.
    pub fn send(&self, session_id: &str, message: ChannelMessage) -> bool {
        if let Some(sender) = self.active.get(session_id) {
            match sender.send(message) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(message)) => {
                    // Connection task is gone but disconnect was not yet
                    // observed; treat as offline.
                    drop(sender);
                    self.disconnect(session_id);
                    self.queue(session_id, message);
                    return false;
                }
            }
        }
        let msg = message;
        self.queue(session_id, msg);
        false
    }

    fn queue(&self, session_id: &str, message: ChannelMessage) {
        self.pending
            .entry(session_id.to_string())
            .or_default()
            .push_back(message);
        debug!(target: "connections", session_id, "Queued message for offline session");
    }

    /// Best effort delivery to every live session.
    pub fn broadcast(&self, message: &ChannelMessage) {
        let mut dead: Vec<String> = Vec::new();
        for entry in self.active.iter() {
            if entry.value().send(message.clone()).is_err() {
                dead.push(entry.key().clone());
            }
        }
        for session_id in dead {
            self.disconnect(&session_id);
        }
    }

    pub fn is_connected(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id)
    }

    pub fn connection_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self, session_id: &str) -> usize {
        self.pending.get(session_id).map(|q| q.len()).unwrap_or(0)
    }

    /// Total frames queued across every offline session.
    pub fn queued_total(&self) -> usize {
        self.pending.iter().map(|entry| entry.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MessageKind;

    fn msg(text: &str) -> ChannelMessage {
        ChannelMessage::text(text)
    }

    #[tokio::test]
    async fn live_session_receives_directly() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.connect("s1", tx);

        assert!(manager.send("s1", msg("hello")));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "hello");
    }

    #[tokio::test]
    async fn offline_messages_queue_and_flush_in_order() {
        let manager = ConnectionManager::new();
        assert!(!manager.send("s1", msg("first")));
        assert!(!manager.send("s1", msg("second")));
        assert_eq!(manager.pending_count("s1"), 2);

        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.connect("s1", tx);
        assert_eq!(manager.pending_count("s1"), 0);

        assert_eq!(rx.recv().await.unwrap().message, "first");
        assert_eq!(rx.recv().await.unwrap().message, "second");

        // New traffic lands after the flushed backlog
        manager.send("s1", msg("third"));
        assert_eq!(rx.recv().await.unwrap().message, "third");
    }

    #[tokio::test]
    async fn dead_channel_falls_back_to_queue() {
        let manager = ConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        manager.connect("s1", tx);
        drop(rx);

        assert!(!manager.send("s1", msg("lost socket")));
        assert!(!manager.is_connected("s1"));
        assert_eq!(manager.pending_count("s1"), 1);
    }

    #[tokio::test]
    async fn broadcast_skips_dead_sessions() {
        let manager = ConnectionManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        manager.connect("alive", tx1);
        manager.connect("dead", tx2);
        drop(rx2);

        manager.broadcast(&ChannelMessage::new(MessageKind::BotMessage, "hi"));
        assert_eq!(rx1.recv().await.unwrap().message, "hi");
        assert!(!manager.is_connected("dead"));
    }
}

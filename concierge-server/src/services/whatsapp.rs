//! Messaging Platform Adapter
//!
//! Outbound message delivery for the persistent channel: payload builders
//! for every message shape the lifecycle sends, the HTTP client, and the
//! db-backed outbox that makes delivery survive messaging-API outages.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::payment_gateway::GatewayError;
use crate::db::repository::OutboxRepository;

const OUTBOX_MAX_RETRIES: u32 = 3;
const OUTBOX_BATCH: u32 = 50;

/// Seam for outbound persistent-channel delivery. The payload is the full
/// platform request body; the implementation only transports it.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, recipient: &str, payload: Value) -> Result<(), GatewayError>;
}

// ========== Payload builders ==========

pub fn text_message(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": { "body": body },
    })
}

/// Interactive reply buttons, at most three per message.
pub fn button_message(to: &str, body: &str, buttons: &[(&str, &str)]) -> Value {
    let buttons: Vec<Value> = buttons
        .iter()
        .map(|(id, title)| {
            json!({
                "type": "reply",
                "reply": { "id": id, "title": title },
            })
        })
        .collect();
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "button",
            "body": { "text": body },
            "action": { "buttons": buttons },
        },
    })
}

/// Call-to-action with a tappable URL (payment links, invoice downloads).
pub fn cta_url_message(to: &str, body: &str, display_text: &str, url: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "cta_url",
            "body": { "text": body },
            "action": {
                "name": "cta_url",
                "parameters": { "display_text": display_text, "url": url },
            },
        },
    })
}

/// Single-section list menu. `rows` is (id, title, description).
pub fn list_message(to: &str, body: &str, button: &str, rows: &[(&str, &str, &str)]) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .map(|(id, title, description)| {
            json!({ "id": id, "title": title, "description": description })
        })
        .collect();
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "list",
            "body": { "text": body },
            "action": {
                "button": button,
                "sections": [{ "title": "Options", "rows": rows }],
            },
        },
    })
}

pub fn image_message(to: &str, link: &str, caption: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "image",
        "image": { "link": link, "caption": caption },
    })
}

/// Launch the encrypted booking form.
pub fn flow_message(to: &str, body: &str, flow_id: &str, flow_token: &str, cta: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "flow",
            "body": { "text": body },
            "action": {
                "name": "flow",
                "parameters": {
                    "flow_message_version": "3",
                    "flow_id": flow_id,
                    "flow_token": flow_token,
                    "flow_cta": cta,
                    "flow_action": "navigate",
                    "flow_action_payload": { "screen": "SERVICE_AND_DATE_SELECTION" },
                },
            },
        },
    })
}

// ========== HTTP client ==========

/// Graph-style messaging API client.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl WhatsAppClient {
    pub fn new(api_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: api_url.into(),
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send(&self, recipient: &str, payload: Value) -> Result<(), GatewayError> {
        let url = format!("{}/messages", self.api_url);
        debug!(target: "whatsapp", %recipient, "Sending message");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// ========== Outbox ==========

/// Durable delivery for the persistent channel. Messages are queued in the
/// `outbox` table and drained in order; each message gets up to three
/// delivery attempts before being parked as failed.
#[derive(Clone)]
pub struct OutboxService {
    repo: OutboxRepository,
    sender: Arc<dyn MessageSender>,
}

impl OutboxService {
    pub fn new(repo: OutboxRepository, sender: Arc<dyn MessageSender>) -> Self {
        Self { repo, sender }
    }

    /// Queue a message for delivery on the next drain pass.
    pub async fn enqueue(&self, recipient: &str, payload: Value) -> crate::utils::AppResult<()> {
        self.repo.enqueue(recipient, payload).await?;
        Ok(())
    }

    /// Deliver every pending message once. Returns how many were sent.
    pub async fn drain_once(&self) -> usize {
        let pending = match self.repo.pending(OUTBOX_BATCH).await {
            Ok(p) => p,
            Err(e) => {
                error!(target: "outbox", error = %e, "Failed to load pending messages");
                return 0;
            }
        };

        let mut sent = 0;
        for message in pending {
            let Some(id) = message.id.clone() else {
                continue;
            };
            match self.sender.send(&message.recipient, message.payload.clone()).await {
                Ok(()) => {
                    if let Err(e) = self.repo.mark_sent(&id).await {
                        error!(target: "outbox", error = %e, "Failed to mark message sent");
                    } else {
                        sent += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        target: "outbox",
                        recipient = %message.recipient,
                        retry_count = message.retry_count,
                        error = %e,
                        "Message delivery failed"
                    );
                    if let Err(mark_err) = self
                        .repo
                        .mark_attempt_failed(&id, &e.to_string(), OUTBOX_MAX_RETRIES)
                        .await
                    {
                        error!(target: "outbox", error = %mark_err, "Failed to record delivery failure");
                    }
                }
            }
        }
        sent
    }

    /// Drain loop, intended to run as a background task.
    pub async fn run(self, poll_interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(target: "outbox", "Outbox drainer stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let sent = self.drain_once().await;
                    if sent > 0 {
                        debug!(target: "outbox", sent, "Drained outbox");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_has_wire_shape() {
        let payload = text_message("628123", "hello");
        assert_eq!(payload["messaging_product"], "whatsapp");
        assert_eq!(payload["to"], "628123");
        assert_eq!(payload["text"]["body"], "hello");
    }

    #[test]
    fn button_payload_keys_replies_by_id() {
        let payload = button_message(
            "628123",
            "New booking EB7",
            &[("accept_EB7", "Accept"), ("decline_EB7", "Decline")],
        );
        let buttons = payload["interactive"]["action"]["buttons"].as_array().unwrap();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0]["reply"]["id"], "accept_EB7");
        assert_eq!(buttons[1]["reply"]["title"], "Decline");
    }

    #[test]
    fn cta_payload_carries_the_url() {
        let payload = cta_url_message("628123", "Pay here", "Pay Now", "https://pay.example/i/1");
        assert_eq!(
            payload["interactive"]["action"]["parameters"]["url"],
            "https://pay.example/i/1"
        );
    }
}

//! Live guest sessions
//!
//! The embedded booking widget opens a WebSocket per conversation. Frames
//! are JSON [`ChannelMessage`] envelopes; delivery and offline queueing are
//! the [`ConnectionManager`]'s job, this module only bridges the socket to
//! an mpsc channel.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Router, routing::get};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use shared::{ChannelMessage, MessageKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/ws/{session_id}", get(ws_upgrade))
}

#[derive(Deserialize)]
struct WsParams {
    /// Villa the embedding page belongs to; bound to the session so later
    /// bookings from this widget land on the right villa.
    villa: Option<String>,
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
    Query(params): Query<WsParams>,
    upgrade: WebSocketUpgrade,
) -> Response {
    if let Some(villa) = params.villa.filter(|v| !v.is_empty()) {
        if let Err(e) = state
            .sessions
            .set_field(&session_id, "villa_code", json!(villa))
            .await
        {
            warn!(target: "ws", session_id, error = %e, "Failed to bind villa code");
        }
    }
    upgrade.on_upgrade(move |socket| handle_socket(state, session_id, socket))
}

async fn handle_socket(state: ServerState, session_id: String, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();

    // Queued frames from before this connection flush here immediately.
    state.connections.connect(&session_id, tx);
    info!(target: "ws", session_id, "Session connected");

    let forward_session = session_id.clone();
    let mut forward = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let is_destroy = frame.kind == MessageKind::Destroy;
            if sink.send(Message::Text(frame.to_wire().into())).await.is_err() {
                break;
            }
            if is_destroy {
                // Protocol teardown frame; the client closes on receipt.
                debug!(target: "ws", session_id = %forward_session, "Destroy frame sent");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut forward => break,
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&state, &session_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(target: "ws", session_id, error = %e, "Socket error");
                        break;
                    }
                }
            }
        }
    }

    forward.abort();
    state.connections.disconnect(&session_id);
    info!(target: "ws", session_id, "Session disconnected");
}

/// Inbound frames from the widget. Only the retry commands are acted on;
/// anything else is conversation text this service does not interpret.
async fn handle_inbound(state: &ServerState, session_id: &str, text: &str) {
    let command = text.trim().to_lowercase();
    if command != "pay" && command != "retry" {
        debug!(target: "ws", session_id, "Ignoring inbound frame");
        return;
    }

    let latest = match state.lifecycle.order_history(session_id, 1, 1).await {
        Ok(bookings) => bookings,
        Err(e) => {
            warn!(target: "ws", session_id, error = %e, "History lookup failed");
            return;
        }
    };
    let Some(booking) = latest.into_iter().next() else {
        state.connections.send(
            session_id,
            ChannelMessage::text("We could not find a booking for this session."),
        );
        return;
    };

    if let Err(e) = state.lifecycle.retry_payment(&booking.order_number).await {
        state.connections.send(
            session_id,
            ChannelMessage::new(MessageKind::Error, e.to_string()),
        );
    }
}

//! Encrypted Flow endpoint
//!
//! The interactive-form client posts an RSA-wrapped AES key plus an
//! AES-GCM sealed payload. The response body is the sealed reply as a bare
//! base64 string, not JSON.
//!
//! Status codes are part of the client contract:
//! - 200 with an empty request body answers the platform's health probe
//! - 421 tells the platform to re-fetch our public key and retry
//! - other non-200s make the client show a generic failure screen

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Router, extract::State, routing::post};
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::ServerState;
use crate::flow::FlowCryptoError;

pub fn router() -> Router<ServerState> {
    Router::new().route("/flow", post(flow_exchange))
}

#[derive(Debug, Deserialize)]
struct FlowEnvelope {
    #[serde(default)]
    encrypted_flow_data: Option<String>,
    #[serde(default)]
    encrypted_aes_key: Option<String>,
    #[serde(default)]
    initial_vector: Option<String>,
}

async fn flow_exchange(State(state): State<ServerState>, body: String) -> Response {
    if body.trim().is_empty() {
        return (StatusCode::OK, "OK").into_response();
    }

    let Some(crypto) = state.flow_crypto.clone() else {
        warn!(target: "flow", "Flow request received but no private key is loaded");
        return (StatusCode::SERVICE_UNAVAILABLE, "Flow channel not configured").into_response();
    };

    let envelope: FlowEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(target: "flow", error = %e, "Malformed Flow request body");
            return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
        }
    };

    let mut missing = Vec::new();
    if envelope.encrypted_flow_data.is_none() {
        missing.push("encrypted_flow_data");
    }
    if envelope.encrypted_aes_key.is_none() {
        missing.push("encrypted_aes_key");
    }
    if envelope.initial_vector.is_none() {
        missing.push("initial_vector");
    }
    if !missing.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
        )
            .into_response();
    }

    // All three checked above
    let data = envelope.encrypted_flow_data.unwrap_or_default();
    let key = envelope.encrypted_aes_key.unwrap_or_default();
    let iv = envelope.initial_vector.unwrap_or_default();

    let exchange = match crypto.open(&data, &key, &iv) {
        Ok(exchange) => exchange,
        Err(FlowCryptoError::KeyUnwrap) => {
            warn!(target: "flow", "AES key unwrap failed; requesting key refresh");
            return (
                StatusCode::MISDIRECTED_REQUEST,
                "Failed to decrypt request key",
            )
                .into_response();
        }
        Err(e) => {
            warn!(target: "flow", error = %e, "Flow decryption failed");
            return (StatusCode::BAD_REQUEST, "Failed to decrypt request").into_response();
        }
    };

    let action = exchange
        .payload
        .get("action")
        .and_then(|a| a.as_str())
        .unwrap_or_default()
        .to_string();
    let reply = state.flow_handler.handle(&exchange.payload).await;

    match exchange.seal(&reply) {
        Ok(sealed) => {
            info!(target: "flow", action = %action, "Flow exchange completed");
            (StatusCode::OK, sealed).into_response()
        }
        Err(e) => {
            warn!(target: "flow", error = %e, "Failed to seal Flow response");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encrypt response").into_response()
        }
    }
}

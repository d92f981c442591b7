//! Messaging platform webhook
//!
//! Inbound guest and provider traffic: button replies driving the claim and
//! decline flows, completed interactive forms creating bookings, and plain
//! text commands.
//!
//! The platform redelivers anything that is not answered 200, so handler
//! failures are logged and acknowledged rather than surfaced; the guest gets
//! an in-channel error message instead of a retry storm.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Router, extract::State, routing::get};
use serde_json::Value;
use shared::{ChannelMessage, ClaimOutcome};
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::core::ServerState;
use crate::orders::CreateOrderRequest;

pub fn router() -> Router<ServerState> {
    Router::new().route(
        "/webhook/whatsapp",
        get(verify_webhook).post(inbound_webhook),
    )
}

/// Subscription handshake: echo the challenge when the verify token matches.
async fn verify_webhook(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == Some("subscribe")
        && !state.config.whatsapp_verify_token.is_empty()
        && token == Some(state.config.whatsapp_verify_token.as_str())
    {
        info!(target: "whatsapp", "Webhook verified");
        (StatusCode::OK, challenge).into_response()
    } else {
        warn!(target: "whatsapp", "Webhook verification failed");
        StatusCode::FORBIDDEN.into_response()
    }
}

async fn inbound_webhook(State(state): State<ServerState>, body: String) -> StatusCode {
    let payload: Value = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(target: "whatsapp", error = %e, "Malformed webhook body");
            return StatusCode::OK;
        }
    };

    for message in extract_messages(&payload) {
        let Some(from) = message.get("from").and_then(Value::as_str) else {
            continue;
        };
        if let Err(e) = dispatch_message(&state, from, message).await {
            error!(target: "whatsapp", from, error = %e, "Failed to handle inbound message");
            let _ = state
                .router
                .send(
                    from,
                    ChannelMessage::text(
                        "Sorry, something went wrong handling your request. Please try again.",
                    ),
                )
                .await;
        }
    }

    StatusCode::OK
}

/// Flatten `entry[].changes[].value.messages[]`.
fn extract_messages(payload: &Value) -> Vec<&Value> {
    let mut messages = Vec::new();
    let Some(entries) = payload.get("entry").and_then(Value::as_array) else {
        return messages;
    };
    for entry in entries {
        let Some(changes) = entry.get("changes").and_then(Value::as_array) else {
            continue;
        };
        for change in changes {
            if let Some(batch) = change
                .pointer("/value/messages")
                .and_then(Value::as_array)
            {
                messages.extend(batch.iter());
            }
        }
    }
    messages
}

async fn dispatch_message(
    state: &ServerState,
    from: &str,
    message: &Value,
) -> crate::utils::AppResult<()> {
    if let Some(button_id) = message
        .pointer("/interactive/button_reply/id")
        .and_then(Value::as_str)
    {
        return handle_button_reply(state, from, button_id).await;
    }

    if let Some(response_json) = message
        .pointer("/interactive/nfm_reply/response_json")
        .and_then(Value::as_str)
    {
        return handle_form_completion(state, from, response_json).await;
    }

    if let Some(text) = message.pointer("/text/body").and_then(Value::as_str) {
        return handle_text(state, from, text).await;
    }

    Ok(())
}

/// Provider-side buttons. The id encodes the action and the order number.
async fn handle_button_reply(
    state: &ServerState,
    from: &str,
    button_id: &str,
) -> crate::utils::AppResult<()> {
    info!(target: "whatsapp", from, button_id, "Button reply");

    // Longest prefixes first: "decline_" is a prefix of nothing, but
    // "confirm_decline_" and "cancel_decline_" both contain "decline_".
    if let Some(order_number) = button_id.strip_prefix("confirm_decline_") {
        return state.lifecycle.confirm_decline(order_number, from).await;
    }
    if let Some(order_number) = button_id.strip_prefix("cancel_decline_") {
        return state.lifecycle.cancel_decline(order_number, from).await;
    }
    if let Some(order_number) = button_id.strip_prefix("accept_") {
        match state.lifecycle.claim_order(order_number, from).await? {
            ClaimOutcome::Won => {}
            ClaimOutcome::AlreadyClaimed { by } => {
                state
                    .router
                    .send(
                        from,
                        ChannelMessage::text(format!(
                            "Booking {} was already accepted by {}.",
                            order_number, by
                        )),
                    )
                    .await?;
            }
            ClaimOutcome::NotFound => {
                state
                    .router
                    .send(
                        from,
                        ChannelMessage::text(format!(
                            "Booking {} is no longer available.",
                            order_number
                        )),
                    )
                    .await?;
            }
        }
        return Ok(());
    }
    if let Some(order_number) = button_id.strip_prefix("decline_") {
        return state.lifecycle.decline_order(order_number, from).await;
    }

    warn!(target: "whatsapp", button_id, "Unrecognized button id");
    Ok(())
}

/// A completed interactive form becomes a booking.
async fn handle_form_completion(
    state: &ServerState,
    from: &str,
    response_json: &str,
) -> crate::utils::AppResult<()> {
    let form: Value = serde_json::from_str(response_json)
        .map_err(|e| crate::utils::AppError::validation(format!("Invalid form response: {}", e)))?;

    let field = |name: &str| {
        form.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    };

    let Some(service_name) = field("selected_service") else {
        return Err(crate::utils::AppError::validation(
            "Form response has no selected_service",
        ));
    };

    let booking = state
        .lifecycle
        .create_order(CreateOrderRequest {
            sender_id: from.to_string(),
            service_name,
            villa_code: field("villa_code"),
            booking_date: field("selected_date"),
            booking_time: field("selected_time"),
            person_count: field("person_count"),
            guest_name: field("customer_name"),
            guest_email: field("customer_email"),
            promo_code: field("promo_code"),
        })
        .await?;

    info!(
        target: "whatsapp",
        from,
        order_number = %booking.order_number,
        "Booking created from form submission"
    );
    Ok(())
}

/// Plain text commands. "pay" / "retry" re-issues the payment link for the
/// guest's most recent order.
async fn handle_text(state: &ServerState, from: &str, text: &str) -> crate::utils::AppResult<()> {
    let command = text.trim().to_lowercase();
    if command != "pay" && command != "retry" {
        return Ok(());
    }

    let latest = state.lifecycle.order_history(from, 1, 1).await?;
    let Some(booking) = latest.into_iter().next() else {
        state
            .router
            .send(
                from,
                ChannelMessage::text("We could not find a booking for this number."),
            )
            .await?;
        return Ok(());
    };

    match state.lifecycle.retry_payment(&booking.order_number).await {
        Ok(_) => Ok(()),
        Err(crate::utils::AppError::Conflict(msg)) => {
            state.router.send(from, ChannelMessage::text(msg)).await
        }
        Err(e) => Err(e),
    }
}

//! Payment gateway callback
//!
//! The gateway posts invoice status changes here. Authentication is a
//! pre-shared token echoed in `x-callback-token`; a mismatch is a hard 401.
//!
//! The gateway retries until it sees 200, so every recognized callback is
//! answered 200 even when it is a duplicate or arrives out of order. The
//! lifecycle's conditional updates make those no-ops.

use axum::http::HeaderMap;
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::ServerState;
use crate::orders::{PaymentEvent, PaymentEventStatus, parse_external_id};
use crate::utils::{AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().route("/webhook/payment", post(payment_callback))
}

/// Invoice status callback payload. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    pub external_id: String,
    pub status: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Serialize)]
pub struct CallbackAck {
    status: &'static str,
}

async fn payment_callback(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(callback): Json<PaymentCallback>,
) -> AppResult<Json<CallbackAck>> {
    let token = headers
        .get("x-callback-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if state.config.payment_callback_token.is_empty()
        || token != state.config.payment_callback_token
    {
        return Err(AppError::Unauthorized);
    }

    let Some(order_number) = parse_external_id(&callback.external_id) else {
        // Not one of ours (shared gateway account); acknowledge and move on.
        info!(
            target: "webhook",
            external_id = %callback.external_id,
            "Ignoring callback with foreign external_id"
        );
        return Ok(Json(CallbackAck { status: "ignored" }));
    };

    let status = match callback.status.as_str() {
        "PAID" | "SETTLED" => PaymentEventStatus::Paid,
        "EXPIRED" => PaymentEventStatus::Expired,
        "FAILED" => PaymentEventStatus::Failed,
        other => {
            warn!(
                target: "webhook",
                order_number,
                status = other,
                "Unhandled callback status"
            );
            return Ok(Json(CallbackAck { status: "ignored" }));
        }
    };

    info!(
        target: "webhook",
        order_number,
        status = %callback.status,
        "Payment callback received"
    );

    state
        .lifecycle
        .handle_payment_event(PaymentEvent {
            order_number: order_number.to_string(),
            status,
            method: callback.payment_method,
            amount: callback.paid_amount,
            paid_at: callback.paid_at,
            failure_reason: callback.failure_reason,
        })
        .await?;

    Ok(Json(CallbackAck { status: "ok" }))
}

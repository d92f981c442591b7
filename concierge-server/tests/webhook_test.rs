//! HTTP contract tests for the payment gateway callback endpoint: the
//! token gate, the acknowledge-and-ignore paths and a full settlement
//! driven through the router.

mod common;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use common::{GUEST, MockGateway, PROVIDER_A, RecordingSender, StubPricing, StubStorage};
use concierge_server::api::build_app;
use concierge_server::core::{Config, ServerState};
use concierge_server::db::DbService;
use shared::OrderStatus;

const TOKEN: &str = "cb-secret";

async fn test_state(tmp: &TempDir, callback_token: &str) -> ServerState {
    let db_path = tmp.path().join("concierge.db");
    let db = DbService::new(&db_path.to_string_lossy())
        .await
        .expect("open scratch database")
        .db();
    let mut config = Config::with_overrides(tmp.path().to_string_lossy().to_string(), 0);
    config.payment_callback_token = callback_token.to_string();
    ServerState::assemble(
        config,
        db,
        Arc::new(StubPricing),
        Arc::new(MockGateway::default()),
        Arc::new(RecordingSender::default()),
        Arc::new(StubStorage),
        None,
    )
}

async fn post_callback(
    app: &axum::Router,
    token: Option<&str>,
    body: &Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/payment")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("x-callback-token", token);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn paid_callback(external_id: &str) -> Value {
    json!({
        "external_id": external_id,
        "status": "PAID",
        "payment_method": "BANK_TRANSFER",
        "paid_amount": 250000.0,
        "paid_at": "2026-09-10T08:00:00Z",
    })
}

#[tokio::test]
async fn callback_with_a_wrong_or_missing_token_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let app = build_app(test_state(&tmp, TOKEN).await);
    let body = paid_callback("booking_EB1_1757000000");

    let (status, _) = post_callback(&app, Some("not-the-token"), &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_callback(&app, None, &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn callback_gate_stays_closed_when_no_token_is_configured() {
    let tmp = TempDir::new().unwrap();
    let app = build_app(test_state(&tmp, "").await);

    let (status, _) =
        post_callback(&app, Some(""), &paid_callback("booking_EB1_1757000000")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_external_id_is_acknowledged_and_ignored() {
    let tmp = TempDir::new().unwrap();
    let app = build_app(test_state(&tmp, TOKEN).await);

    let (status, body) =
        post_callback(&app, Some(TOKEN), &paid_callback("invoice_12345")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn unknown_status_is_acknowledged_and_ignored() {
    let tmp = TempDir::new().unwrap();
    let app = build_app(test_state(&tmp, TOKEN).await);

    let callback = json!({
        "external_id": "booking_EB1_1757000000",
        "status": "VOIDED",
    });
    let (status, body) = post_callback(&app, Some(TOKEN), &callback).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn paid_callback_settles_the_booking() {
    let tmp = TempDir::new().unwrap();
    let state = test_state(&tmp, TOKEN).await;
    let app = build_app(state.clone());

    let booking = state
        .lifecycle
        .create_order(concierge_server::orders::CreateOrderRequest {
            sender_id: GUEST.to_string(),
            service_name: common::SERVICE.to_string(),
            villa_code: Some("villa-9".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    state
        .lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();
    let claimed = state.lifecycle.get_order(&booking.order_number).await.unwrap();
    let external_id = claimed.payment.external_id.unwrap();

    let (status, body) = post_callback(&app, Some(TOKEN), &paid_callback(&external_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let settled = state.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(settled.status, OrderStatus::FundsDistributed);
    assert!(settled.invoice.is_some());
}

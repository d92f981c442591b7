use axum::Router;
use axum::routing::{get, post};

use crate::core::ServerState;

pub mod handler;

/// Order REST API - consumed by the villa dashboard and the booking widget
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/orders", post(handler::create))
        .route("/api/orders/{order_number}", get(handler::get_order))
        .route("/api/orders/{order_number}/cancel", post(handler::cancel))
        .route(
            "/api/orders/{order_number}/retry-payment",
            post(handler::retry_payment),
        )
        .route("/api/orders/history/{sender_id}", get(handler::history))
}

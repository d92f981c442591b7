//! HTTP API
//!
//! Route registration and the middleware stack. Every surface the outside
//! world touches hangs off here: guest/provider webhooks, the encrypted
//! Flow endpoint, payment gateway callbacks, live WebSocket sessions and
//! the order REST API.

use axum::Router;
use http::{HeaderName, HeaderValue};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

pub mod flow;
pub mod health;
pub mod orders;
pub mod webhook;
pub mod whatsapp;
pub mod ws;

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Order REST API
        .merge(orders::router())
        // Payment gateway callbacks
        .merge(webhook::router())
        // Messaging platform webhook (guest/provider conversations)
        .merge(whatsapp::router())
        // Encrypted Flow endpoint
        .merge(flow::router())
        // Live guest sessions
        .merge(ws::router())
        // Health API - public route
        .merge(health::router())
}

/// Build the fully configured application with middleware and state.
pub fn build_app(state: ServerState) -> Router {
    build_router()
        // CORS - the widget runs on villa domains
        .layer(CorsLayer::permissive())
        // Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        // Request ID in and out
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .with_state(state)
}

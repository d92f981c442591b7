//! Order REST handlers

use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::Booking;
use crate::orders::CreateOrderRequest;
use crate::utils::AppResult;

/// Create-order request payload
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderBody {
    #[validate(length(min = 1, message = "sender_id is required"))]
    pub sender_id: String,
    #[validate(length(min = 1, message = "service_name is required"))]
    pub service_name: String,
    pub villa_code: Option<String>,
    pub booking_date: Option<String>,
    pub booking_time: Option<String>,
    pub person_count: Option<String>,
    #[validate(length(min = 2, message = "guest_name must be at least 2 characters"))]
    pub guest_name: Option<String>,
    #[validate(email(message = "guest_email must be a valid email"))]
    pub guest_email: Option<String>,
    pub promo_code: Option<String>,
}

pub async fn create(
    State(state): State<ServerState>,
    Json(body): Json<CreateOrderBody>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    body.validate()?;

    // Web widget sessions bind their villa at connect time; fall back to it
    // when the request does not carry one explicitly.
    let villa_code = match body.villa_code {
        Some(code) => Some(code),
        None => state
            .sessions
            .get_field(
                &body.sender_id,
                "villa_code",
                state.config.session_ttl_hours,
            )
            .await?
            .and_then(|v| v.as_str().map(String::from)),
    };

    let booking = state
        .lifecycle
        .create_order(CreateOrderRequest {
            sender_id: body.sender_id,
            service_name: body.service_name,
            villa_code,
            booking_date: body.booking_date,
            booking_time: body.booking_time,
            person_count: body.person_count,
            guest_name: body.guest_name,
            guest_email: body.guest_email,
            promo_code: body.promo_code,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_order(
    State(state): State<ServerState>,
    Path(order_number): Path<String>,
) -> AppResult<Json<Booking>> {
    let booking = state.lifecycle.get_order(&order_number).await?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn cancel(
    State(state): State<ServerState>,
    Path(order_number): Path<String>,
    Json(body): Json<CancelBody>,
) -> AppResult<Json<Booking>> {
    let reason = body.reason.as_deref().unwrap_or("Cancelled by guest");
    let booking = state.lifecycle.cancel_order(&order_number, reason).await?;
    Ok(Json(booking))
}

pub async fn retry_payment(
    State(state): State<ServerState>,
    Path(order_number): Path<String>,
) -> AppResult<Json<Booking>> {
    let booking = state.lifecycle.retry_payment(&order_number).await?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub page: u32,
    pub limit: u32,
    pub orders: Vec<Booking>,
}

pub async fn history(
    State(state): State<ServerState>,
    Path(sender_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<HistoryResponse>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let orders = state.lifecycle.order_history(&sender_id, page, limit).await?;
    Ok(Json(HistoryResponse {
        page,
        limit,
        orders,
    }))
}

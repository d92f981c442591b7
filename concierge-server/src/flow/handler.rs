//! Flow screen logic
//!
//! Dispatches decrypted Flow actions to screen responses. The form collects
//! service, date and guest contact in one screen; submission returns the
//! terminal SUCCESS screen whose params come back to us later as an
//! `nfm_reply` on the inbound webhook, where the actual booking is created.

use chrono::{NaiveDate, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::{PricingResolver, ServiceListing};

const SCREEN_FORM: &str = "SERVICE_AND_DATE_SELECTION";
const SCREEN_SUCCESS: &str = "SUCCESS";
const SCREEN_ERROR: &str = "ERROR";

#[derive(Clone)]
pub struct FlowHandler {
    pricing: Arc<dyn PricingResolver>,
}

impl FlowHandler {
    pub fn new(pricing: Arc<dyn PricingResolver>) -> Self {
        Self { pricing }
    }

    /// Handle one decrypted request and produce the plaintext response to
    /// seal. Unknown actions get an ERROR screen rather than a refusal so
    /// the client renders something sensible.
    pub async fn handle(&self, payload: &Value) -> Value {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        let flow_token = payload
            .get("flow_token")
            .and_then(Value::as_str)
            .unwrap_or_default();

        info!(target: "flow", action, flow_token, "Handling flow action");

        match action {
            "ping" => json!({"data": {"status": "active"}}),
            "INIT" => self.form_screen(flow_token, None).await,
            "data_exchange" => self.handle_submission(payload, flow_token).await,
            other => {
                warn!(target: "flow", action = other, "Unknown flow action");
                json!({
                    "screen": SCREEN_ERROR,
                    "data": {"error": format!("Unknown action: {}", other)}
                })
            }
        }
    }

    /// Build the booking form screen, optionally with a validation error.
    async fn form_screen(&self, flow_token: &str, error: Option<String>) -> Value {
        let services = match self.pricing.list_services().await {
            Ok(services) => services,
            Err(e) => {
                warn!(target: "flow", error = %e, "Failed to load service catalog");
                Vec::new()
            }
        };
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        json!({
            "screen": SCREEN_FORM,
            "data": {
                "service_items": service_items(&services),
                "min_date": today,
                "today_date": today,
                "flow_token": flow_token,
                "show_error": error.is_some(),
                "error_message": error.unwrap_or_default(),
            }
        })
    }

    async fn handle_submission(&self, payload: &Value, flow_token: &str) -> Value {
        let empty = json!({});
        let data = payload.get("data").unwrap_or(&empty);
        let service_id = data.get("selected_service").and_then(Value::as_str);
        let selected_date = data.get("selected_date").and_then(Value::as_str);
        let customer_name = data.get("customer_name").and_then(Value::as_str);
        let customer_phone = data.get("customer_phone").and_then(Value::as_str);

        let services = self.pricing.list_services().await.unwrap_or_default();

        let mut errors: Vec<String> = Vec::new();

        let selected = match service_id {
            None | Some("") => {
                errors.push("Please select a service".to_string());
                None
            }
            Some(id) => {
                let found = services.iter().find(|s| s.id == id);
                if found.is_none() {
                    errors.push("Invalid service selection".to_string());
                }
                found
            }
        };

        match selected_date {
            None | Some("") => errors.push("Please select a booking date".to_string()),
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(d) if d < Utc::now().date_naive() => {
                    errors.push("Please select a future date".to_string());
                }
                Ok(_) => {}
                Err(_) => errors.push("Invalid date format".to_string()),
            },
        }

        if customer_name.map(str::trim).is_none_or(|n| n.len() < 2) {
            errors.push("Please enter a valid name (at least 2 characters)".to_string());
        }
        if customer_phone.map(str::trim).is_none_or(|p| p.len() < 10) {
            errors.push("Please enter a valid phone number".to_string());
        }

        if !errors.is_empty() {
            return self.form_screen(flow_token, Some(errors.join(" | "))).await;
        }

        // Validated above
        let service = selected.cloned().unwrap_or_default();
        let date = selected_date.unwrap_or_default();
        let formatted_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|d| d.format("%B %d, %Y").to_string())
            .unwrap_or_else(|_| date.to_string());

        json!({
            "screen": SCREEN_SUCCESS,
            "data": {
                "extension_message_response": {
                    "params": {
                        "flow_token": flow_token,
                        "selected_service": service.id,
                        "service_title": service.title,
                        "service_price": service.price_display,
                        "selected_date": date,
                        "formatted_date": formatted_date,
                        "customer_name": customer_name.unwrap_or_default().trim(),
                        "customer_phone": customer_phone.unwrap_or_default().trim(),
                        "status": "booking_completed",
                    }
                }
            }
        })
    }
}

fn service_items(services: &[ServiceListing]) -> Value {
    Value::Array(
        services
            .iter()
            .map(|s| {
                json!({
                    "id": s.id,
                    "title": s.title,
                    "description": s.description,
                    "metadata": s.price_display,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::AppResult;
    use async_trait::async_trait;

    struct FixedCatalog;

    #[async_trait]
    impl PricingResolver for FixedCatalog {
        async fn list_services(&self) -> AppResult<Vec<ServiceListing>> {
            Ok(vec![ServiceListing {
                id: "1".to_string(),
                title: "Balinese Massage - 60min".to_string(),
                description: "Full body massage".to_string(),
                price_display: "Rp 250,000".to_string(),
            }])
        }

        async fn base_price(&self, _service: &str) -> AppResult<String> {
            Ok("250000".to_string())
        }

        async fn price_distribution(
            &self,
            _service: &str,
        ) -> AppResult<crate::services::PriceDistribution> {
            unimplemented!("not used by flow screens")
        }

        async fn provider_bank(
            &self,
            _code: &str,
        ) -> AppResult<Option<crate::db::models::BankDetails>> {
            Ok(None)
        }

        async fn villa_bank(
            &self,
            _code: &str,
        ) -> AppResult<Option<crate::db::models::BankDetails>> {
            Ok(None)
        }

        async fn providers_for(&self, _service: &str) -> AppResult<Vec<String>> {
            Ok(vec![])
        }
    }

    fn handler() -> FlowHandler {
        FlowHandler::new(Arc::new(FixedCatalog))
    }

    #[tokio::test]
    async fn ping_reports_active() {
        let response = handler().handle(&json!({"action": "ping"})).await;
        assert_eq!(response["data"]["status"], "active");
    }

    #[tokio::test]
    async fn init_returns_form_with_catalog() {
        let response = handler()
            .handle(&json!({"action": "INIT", "flow_token": "tok-1"}))
            .await;
        assert_eq!(response["screen"], SCREEN_FORM);
        assert_eq!(response["data"]["flow_token"], "tok-1");
        assert_eq!(response["data"]["show_error"], false);
        assert_eq!(response["data"]["service_items"][0]["id"], "1");
    }

    #[tokio::test]
    async fn submission_with_past_date_re_renders_form() {
        let response = handler()
            .handle(&json!({
                "action": "data_exchange",
                "flow_token": "tok-1",
                "data": {
                    "selected_service": "1",
                    "selected_date": "2020-01-01",
                    "customer_name": "Anna",
                    "customer_phone": "6281234567890",
                }
            }))
            .await;
        assert_eq!(response["screen"], SCREEN_FORM);
        assert_eq!(response["data"]["show_error"], true);
        assert!(
            response["data"]["error_message"]
                .as_str()
                .unwrap()
                .contains("future date")
        );
    }

    #[tokio::test]
    async fn valid_submission_completes_the_flow() {
        let tomorrow = (Utc::now().date_naive() + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let response = handler()
            .handle(&json!({
                "action": "data_exchange",
                "flow_token": "tok-9",
                "data": {
                    "selected_service": "1",
                    "selected_date": tomorrow,
                    "customer_name": "Anna",
                    "customer_phone": "6281234567890",
                }
            }))
            .await;
        assert_eq!(response["screen"], SCREEN_SUCCESS);
        let params = &response["data"]["extension_message_response"]["params"];
        assert_eq!(params["flow_token"], "tok-9");
        assert_eq!(params["status"], "booking_completed");
        assert_eq!(params["service_title"], "Balinese Massage - 60min");
    }

    #[tokio::test]
    async fn unknown_action_yields_error_screen() {
        let response = handler().handle(&json!({"action": "nonsense"})).await;
        assert_eq!(response["screen"], SCREEN_ERROR);
    }
}

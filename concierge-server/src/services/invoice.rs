//! Invoice Service
//!
//! Builds the structured invoice snapshot after a successful payment,
//! renders it as an HTML document and stores it, returning the record that
//! gets persisted on the booking.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::ObjectStorage;
use crate::db::models::{Booking, InvoiceRecord};
use crate::utils::AppResult;

#[derive(Clone)]
pub struct InvoiceService {
    storage: Arc<dyn ObjectStorage>,
}

impl InvoiceService {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Generate, upload and return the invoice for a paid booking.
    pub async fn generate(&self, booking: &Booking) -> AppResult<InvoiceRecord> {
        let invoice_number = format!("INV-{}", booking.order_number);
        let generated_at = Utc::now().to_rfc3339();
        let paid_at = booking.payment.paid_at.clone().unwrap_or_default();
        let method = booking
            .payment
            .method
            .clone()
            .unwrap_or_else(|| "Online Payment".to_string());
        let payer = booking.guest_name.clone().unwrap_or_else(|| "Customer".to_string());

        let snapshot = json!({
            "receipt_no": invoice_number,
            "name": payer,
            "phone": booking.sender_id,
            "email": booking.guest_email,
            "items": [
                { "description": booking.service_name, "amount": booking.price }
            ],
            "total": booking.price,
            "payment_method": method,
            "paid_at": paid_at,
        });

        let html = render_html(&invoice_number, booking, &payer, &method, &paid_at);
        let key = format!(
            "invoices/{}/invoice_{}.html",
            booking.order_number,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let download_url = self
            .storage
            .put(&key, html.into_bytes(), "text/html; charset=utf-8")
            .await?;

        info!(
            target: "invoice",
            order_number = %booking.order_number,
            %invoice_number,
            "Invoice generated"
        );

        Ok(InvoiceRecord {
            invoice_number,
            download_url,
            generated_at,
            snapshot,
        })
    }
}

fn render_html(
    invoice_number: &str,
    booking: &Booking,
    payer: &str,
    method: &str,
    paid_at: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{number}</title></head>
<body style="font-family: sans-serif; max-width: 640px; margin: 2em auto;">
  <h1>Receipt {number}</h1>
  <p>Billed to: {payer}<br>Phone: {phone}</p>
  <table style="width: 100%; border-collapse: collapse;">
    <tr style="border-bottom: 1px solid #ccc;"><th align="left">Description</th><th align="right">Amount</th></tr>
    <tr><td>{service}</td><td align="right">Rp {price}</td></tr>
    <tr style="border-top: 2px solid #000;"><td><b>Total</b></td><td align="right"><b>Rp {price}</b></td></tr>
  </table>
  <p>Payment method: {method}<br>Paid at: {paid_at}</p>
  <p>Order number: {order}</p>
</body>
</html>"#,
        number = invoice_number,
        payer = payer,
        phone = booking.sender_id,
        service = booking.service_name,
        price = booking.price,
        method = method,
        paid_at = paid_at,
        order = booking.order_number,
    )
}

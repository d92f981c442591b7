//! Order Lifecycle Orchestrator
//!
//! The only place booking state transitions are decided. Repositories give
//! it atomic conditional updates; external adapters give it money movement
//! and messaging; this module sequences them and keeps the guest and the
//! provider informed at every step.
//!
//! Per order, claim -> invoice -> notify runs strictly sequentially. Across
//! orders everything is concurrent; the conditional updates in the
//! repository are what make that safe.

use chrono::Utc;
use shared::{ChannelMessage, ClaimOutcome, MessageKind, OrderStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{PaymentEvent, PaymentEventStatus};
use crate::db::models::{
    BankDetails, Booking, BookingCreate, DisbursementRecord, DistributionData, PartyShare,
};
use crate::db::repository::{OrderRepository, SequenceRepository};
use crate::notify::NotificationRouter;
use crate::services::whatsapp;
use crate::services::{
    DisbursementRequest, InvoiceLineItem, InvoiceRequest, InvoiceService, PaymentGateway,
    PricingResolver, PromoService, clean_price_string,
};
use crate::utils::{AppError, AppResult};

/// Everything the guest supplies to start a booking.
#[derive(Debug, Clone, Default)]
pub struct CreateOrderRequest {
    pub sender_id: String,
    pub service_name: String,
    pub villa_code: Option<String>,
    pub booking_date: Option<String>,
    pub booking_time: Option<String>,
    pub person_count: Option<String>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub promo_code: Option<String>,
}

#[derive(Clone)]
pub struct OrderLifecycle {
    orders: OrderRepository,
    sequences: SequenceRepository,
    pricing: Arc<dyn PricingResolver>,
    gateway: Arc<dyn PaymentGateway>,
    promo: PromoService,
    invoices: InvoiceService,
    router: NotificationRouter,
    public_base_url: String,
    invoice_duration_secs: u64,
}

impl OrderLifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: OrderRepository,
        sequences: SequenceRepository,
        pricing: Arc<dyn PricingResolver>,
        gateway: Arc<dyn PaymentGateway>,
        promo: PromoService,
        invoices: InvoiceService,
        router: NotificationRouter,
        public_base_url: String,
        invoice_duration_secs: u64,
    ) -> Self {
        Self {
            orders,
            sequences,
            pricing,
            gateway,
            promo,
            invoices,
            router,
            public_base_url,
            invoice_duration_secs,
        }
    }

    pub fn router(&self) -> &NotificationRouter {
        &self.router
    }

    // ========== Creation ==========

    /// Create a booking: resolve pricing (and promo), assign the next order
    /// number, persist it pending, fan claim prompts out to every provider
    /// of the service and confirm receipt to the guest.
    pub async fn create_order(&self, req: CreateOrderRequest) -> AppResult<Booking> {
        if req.sender_id.trim().is_empty() {
            return Err(AppError::validation("sender_id must not be empty"));
        }
        if req.service_name.trim().is_empty() {
            return Err(AppError::validation("service_name must not be empty"));
        }

        let base_display = self.pricing.base_price(&req.service_name).await?;
        let base_amount = clean_price_string(&base_display)?;

        let (final_amount, discount, promo_code) = match &req.promo_code {
            Some(code) if !code.trim().is_empty() => {
                let quote = self.promo.validate(code, base_amount).await?;
                (
                    quote.final_amount,
                    quote.discount,
                    Some(code.trim().to_uppercase()),
                )
            }
            _ => (base_amount, 0, None),
        };

        // Bind the redemption before anything is persisted; losing the
        // usage-limit race after the booking exists would strand a
        // discounted order nobody can honor.
        if let Some(code) = &promo_code {
            self.promo.increment_usage(code).await?;
        }

        let order_number = self.sequences.next_order_number().await?;
        let booking = self
            .orders
            .create(
                &order_number,
                BookingCreate {
                    sender_id: req.sender_id.clone(),
                    guest_name: req.guest_name,
                    guest_email: req.guest_email,
                    service_name: req.service_name.clone(),
                    villa_code: req.villa_code,
                    price: final_amount.to_string(),
                    original_price: (discount > 0).then(|| base_amount.to_string()),
                    discount_amount: discount as f64,
                    promo_code: promo_code.clone(),
                    booking_date: req.booking_date,
                    booking_time: req.booking_time,
                    person_count: req.person_count,
                },
            )
            .await?;

        info!(
            target: "orders",
            order_number = %booking.order_number,
            service = %booking.service_name,
            sender = %booking.sender_id,
            "Order created"
        );

        self.fan_out_claim_prompts(&booking).await;

        let _ = self
            .router
            .send(
                &booking.sender_id,
                ChannelMessage::text(format!(
                    "Your booking {} for {} has been received. \
                     We are confirming availability with our providers.",
                    booking.order_number, booking.service_name
                )),
            )
            .await;

        Ok(booking)
    }

    /// Send the Accept/Decline prompt to every provider of the service.
    /// Delivery failures are logged, never fatal: a booking with zero
    /// reachable providers still exists and can be claimed later.
    async fn fan_out_claim_prompts(&self, booking: &Booking) {
        let providers = match self.pricing.providers_for(&booking.service_name).await {
            Ok(providers) => providers,
            Err(e) => {
                error!(
                    target: "orders",
                    order_number = %booking.order_number,
                    error = %e,
                    "Failed to resolve providers for claim fan-out"
                );
                return;
            }
        };
        if providers.is_empty() {
            warn!(
                target: "orders",
                order_number = %booking.order_number,
                service = %booking.service_name,
                "No providers registered for service"
            );
            return;
        }

        for provider in providers {
            self.send_claim_prompt(&provider, booking).await;
        }
    }

    async fn send_claim_prompt(&self, provider: &str, booking: &Booking) {
        let body = claim_prompt_body(booking);
        let accept = format!("accept_{}", booking.order_number);
        let decline = format!("decline_{}", booking.order_number);
        let payload = whatsapp::button_message(
            provider,
            &body,
            &[(accept.as_str(), "Accept"), (decline.as_str(), "Decline")],
        );
        if let Err(e) = self
            .router
            .send_payload(provider, payload, ChannelMessage::text(body))
            .await
        {
            warn!(
                target: "orders",
                order_number = %booking.order_number,
                provider,
                error = %e,
                "Failed to send claim prompt"
            );
        }
    }

    // ========== Claim race ==========

    /// A provider tapped Accept. Exactly one caller per order ever gets
    /// `Won`; the winner's path continues into invoice creation and guest
    /// notification before this returns.
    pub async fn claim_order(&self, order_number: &str, provider: &str) -> AppResult<ClaimOutcome> {
        let Some(booking) = self.orders.try_claim(order_number, provider).await? else {
            return match self.orders.find_by_number(order_number).await? {
                Some(existing) => match existing.confirmed_by_provider {
                    Some(by) => Ok(ClaimOutcome::AlreadyClaimed { by }),
                    // Unclaimed but no longer claimable (cancelled)
                    None => Ok(ClaimOutcome::NotFound),
                },
                None => Ok(ClaimOutcome::NotFound),
            };
        };

        info!(
            target: "orders",
            order_number,
            provider,
            "Claim won"
        );

        match self.issue_payment_link(&booking).await {
            Ok(updated) => {
                self.notify_payment_link(&updated).await;
                let _ = self
                    .router
                    .send(
                        provider,
                        ChannelMessage::text(format!(
                            "Booking {} is confirmed to you. \
                             The guest has been sent a payment link.",
                            order_number
                        )),
                    )
                    .await;
            }
            Err(e) => {
                // The claim stands; only the link is missing. The guest can
                // retry, which re-enters issue_payment_link.
                error!(
                    target: "orders",
                    order_number,
                    error = %e,
                    "Payment link creation failed after claim"
                );
                let _ = self
                    .router
                    .send(
                        &booking.sender_id,
                        ChannelMessage::new(
                            MessageKind::Error,
                            format!(
                                "Your booking {} is confirmed, but we could not create the \
                                 payment link. Reply \"Pay\" to try again.",
                                order_number
                            ),
                        ),
                    )
                    .await;
                let _ = self
                    .router
                    .send(
                        provider,
                        ChannelMessage::text(format!(
                            "Booking {} is confirmed to you, but the payment link could not \
                             be created yet. The guest was asked to retry.",
                            order_number
                        )),
                    )
                    .await;
            }
        }

        Ok(ClaimOutcome::Won)
    }

    /// Create the hosted invoice and move the booking to payment_pending.
    ///
    /// Bank details for both payout parties are resolved first; if either
    /// is missing the booking must not take money it cannot distribute, so
    /// the whole operation aborts before the gateway call.
    async fn issue_payment_link(&self, booking: &Booking) -> AppResult<Booking> {
        let provider_code = booking
            .service_provider_code
            .as_deref()
            .ok_or_else(|| AppError::conflict("Booking has no confirmed provider"))?;
        let villa_code = booking
            .villa_code
            .as_deref()
            .ok_or_else(|| AppError::validation("Booking has no villa code"))?;

        let distribution = self.pricing.price_distribution(&booking.service_name).await?;
        let provider_bank = self
            .pricing
            .provider_bank(provider_code)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No bank details for provider {}", provider_code))
            })?;
        let villa_bank = self
            .pricing
            .villa_bank(villa_code)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No bank details for villa {}", villa_code))
            })?;

        let amount = clean_price_string(&booking.price)?;
        let external_id = format!(
            "booking_{}_{}",
            booking.order_number,
            Utc::now().timestamp()
        );

        let invoice = self
            .gateway
            .create_invoice(InvoiceRequest {
                external_id: external_id.clone(),
                amount: amount as f64,
                description: invoice_description(booking),
                customer_phone: booking.sender_id.clone(),
                duration_secs: self.invoice_duration_secs,
                success_redirect_url: format!("{}/chatbot", self.public_base_url),
                failure_redirect_url: format!(
                    "{}/payment-failed?order={}",
                    self.public_base_url, booking.order_number
                ),
                items: vec![InvoiceLineItem {
                    name: booking.service_name.clone(),
                    quantity: 1.0,
                    price: amount as f64,
                }],
            })
            .await?;

        let distribution_data = build_distribution(&distribution, provider_bank, villa_bank);

        self.orders
            .set_payment_issued(
                &booking.order_number,
                &invoice.invoice_id,
                &invoice.payment_url,
                &external_id,
                amount as f64,
                &invoice.expires_at,
                distribution_data,
            )
            .await?
            .ok_or_else(|| {
                AppError::conflict(format!(
                    "Order {} left a payable state before the link was stored",
                    booking.order_number
                ))
            })
    }

    async fn notify_payment_link(&self, booking: &Booking) {
        let Some(url) = booking.payment.payment_url.as_deref() else {
            return;
        };
        let body = format!(
            "Good news! Your booking {} is confirmed. \
             Please complete the payment within 24 hours.",
            booking.order_number
        );
        let payload = whatsapp::cta_url_message(&booking.sender_id, &body, "Pay Now", url);
        let fallback = ChannelMessage::link(body, url);
        if let Err(e) = self
            .router
            .send_payload(&booking.sender_id, payload, fallback)
            .await
        {
            error!(
                target: "orders",
                order_number = %booking.order_number,
                error = %e,
                "Failed to deliver payment link"
            );
        }
    }

    // ========== Declines ==========

    /// First tap of Decline: ask the provider to confirm. Nothing is
    /// recorded yet.
    pub async fn decline_order(&self, order_number: &str, provider: &str) -> AppResult<()> {
        if self.orders.find_by_number(order_number).await?.is_none() {
            return Err(AppError::not_found(format!("Order {} not found", order_number)));
        }
        let confirm = format!("confirm_decline_{}", order_number);
        let cancel = format!("cancel_decline_{}", order_number);
        let body = format!("Decline booking {}? This cannot be undone.", order_number);
        let payload = whatsapp::button_message(
            provider,
            &body,
            &[(confirm.as_str(), "Yes, decline"), (cancel.as_str(), "Go back")],
        );
        self.router
            .send_payload(provider, payload, ChannelMessage::text(body))
            .await
    }

    /// Confirmed decline. Always recorded against the provider; the booking
    /// itself only moves to `declined` while still unclaimed, and even then
    /// remains claimable by the providers who have not declined. The guest
    /// is told only once every provider has passed.
    pub async fn confirm_decline(&self, order_number: &str, provider: &str) -> AppResult<()> {
        let booking = self
            .orders
            .record_decline(order_number, provider)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", order_number)))?;

        info!(
            target: "orders",
            order_number,
            provider,
            status = %booking.status,
            "Decline recorded"
        );

        let _ = self
            .router
            .send(
                provider,
                ChannelMessage::text(format!("You have declined booking {}.", order_number)),
            )
            .await;

        if booking.status == OrderStatus::Declined && self.all_providers_declined(&booking).await {
            let _ = self
                .router
                .send(
                    &booking.sender_id,
                    ChannelMessage::text(format!(
                        "We're sorry, booking {} could not be fulfilled by our providers. \
                         Please try a different service or time.",
                        order_number
                    )),
                )
                .await;
        }
        Ok(())
    }

    async fn all_providers_declined(&self, booking: &Booking) -> bool {
        match self.pricing.providers_for(&booking.service_name).await {
            Ok(providers) => {
                !providers.is_empty()
                    && providers.iter().all(|p| booking.declined_by.contains(p))
            }
            Err(e) => {
                warn!(
                    target: "orders",
                    order_number = %booking.order_number,
                    error = %e,
                    "Could not resolve providers to finalize decline"
                );
                false
            }
        }
    }

    /// The provider backed out of declining; re-offer the claim prompt if
    /// the order is still up for grabs.
    pub async fn cancel_decline(&self, order_number: &str, provider: &str) -> AppResult<()> {
        let booking = self
            .orders
            .find_by_number(order_number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", order_number)))?;
        let still_claimable = booking.confirmed_by_provider.is_none()
            && matches!(
                booking.status,
                OrderStatus::Pending | OrderStatus::Declined
            );
        if still_claimable {
            self.send_claim_prompt(provider, &booking).await;
        } else {
            let _ = self
                .router
                .send(
                    provider,
                    ChannelMessage::text(format!(
                        "Booking {} is no longer available.",
                        order_number
                    )),
                )
                .await;
        }
        Ok(())
    }

    // ========== Retry / cancel ==========

    /// Guest asked for a payment link again. While the current link is
    /// still live it is resent as-is; only an expired or failed one is
    /// replaced with a fresh invoice, so the gateway never holds two
    /// payable invoices for the same booking.
    pub async fn retry_payment(&self, order_number: &str) -> AppResult<Booking> {
        let booking = self
            .orders
            .find_by_number(order_number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", order_number)))?;

        if booking.confirmed_by_provider.is_none() {
            return Err(AppError::conflict(format!(
                "Order {} has not been confirmed by a provider yet",
                order_number
            )));
        }

        if booking.status == OrderStatus::PaymentPending {
            if booking.payment.payment_url.is_none() {
                return Err(AppError::conflict(format!(
                    "Order {} is awaiting payment but has no stored link",
                    order_number
                )));
            }
            self.notify_payment_link(&booking).await;
            return Ok(booking);
        }

        if !(booking.status.is_retryable() || booking.status == OrderStatus::Pending) {
            return Err(AppError::conflict(format!(
                "Order {} cannot be re-invoiced in status {}",
                order_number, booking.status
            )));
        }

        let updated = self.issue_payment_link(&booking).await?;
        self.notify_payment_link(&updated).await;
        Ok(updated)
    }

    /// Cancel before payment. Refuses (Conflict) once funds are in or the
    /// booking is already terminal.
    pub async fn cancel_order(&self, order_number: &str, reason: &str) -> AppResult<Booking> {
        let booking = self.orders.cancel(order_number, reason).await?;

        info!(target: "orders", order_number, reason, "Order cancelled");

        let _ = self
            .router
            .send(
                &booking.sender_id,
                ChannelMessage::text(format!("Your booking {} has been cancelled.", order_number)),
            )
            .await;
        if let Some(provider) = booking.confirmed_by_provider.as_deref() {
            let _ = self
                .router
                .send(
                    provider,
                    ChannelMessage::text(format!(
                        "Booking {} was cancelled by the guest.",
                        order_number
                    )),
                )
                .await;
        }
        Ok(booking)
    }

    pub async fn get_order(&self, order_number: &str) -> AppResult<Booking> {
        self.orders
            .find_by_number(order_number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", order_number)))
    }

    pub async fn order_history(
        &self,
        sender_id: &str,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<Booking>> {
        Ok(self.orders.history(sender_id, page, limit).await?)
    }

    // ========== Payment events ==========

    /// Webhook-driven transitions. Redelivered and out-of-order events are
    /// acknowledged no-ops; nothing here ever moves a paid booking back.
    pub async fn handle_payment_event(&self, event: PaymentEvent) -> AppResult<()> {
        match event.status {
            PaymentEventStatus::Paid => self.handle_paid(event).await,
            PaymentEventStatus::Expired => self.handle_expired(&event.order_number).await,
            PaymentEventStatus::Failed => self.handle_failed(event).await,
        }
    }

    async fn handle_paid(&self, event: PaymentEvent) -> AppResult<()> {
        let paid_at = event
            .paid_at
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        let Some(booking) = self
            .orders
            .mark_paid(
                &event.order_number,
                event.method.as_deref(),
                event.amount,
                &paid_at,
            )
            .await?
        else {
            info!(
                target: "orders",
                order_number = %event.order_number,
                "PAID event ignored (already processed or not payable)"
            );
            return Ok(());
        };

        info!(target: "orders", order_number = %booking.order_number, "Payment completed");

        let _ = self
            .router
            .send(
                &booking.sender_id,
                ChannelMessage::text(format!(
                    "Payment received for booking {}. Thank you!",
                    booking.order_number
                )),
            )
            .await;

        // Disbursement failure is recorded, never propagated: the payment
        // stays completed and the invoice still goes out.
        let booking = self.distribute_payments(booking).await;
        self.generate_and_deliver_invoice(&booking).await;

        if let Some(provider) = booking.confirmed_by_provider.as_deref() {
            let _ = self
                .router
                .send(
                    provider,
                    ChannelMessage::text(format!(
                        "The guest has paid for booking {}. Your share is on its way.",
                        booking.order_number
                    )),
                )
                .await;
        }
        Ok(())
    }

    /// Send both payout legs. Returns the booking in its post-distribution
    /// state (funds_distributed or distribution_failed).
    async fn distribute_payments(&self, booking: Booking) -> Booking {
        let order_number = booking.order_number.clone();
        let Some(distribution) = booking.payment.distribution_data.clone() else {
            error!(
                target: "orders",
                order_number = %order_number,
                "Paid booking has no distribution data"
            );
            return self
                .record_distribution_failure(booking, "Missing distribution data")
                .await;
        };

        let legs = [
            (
                "service_provider",
                format!("sp_{}", order_number),
                distribution.service_provider.clone(),
                format!("Service provider payment for order {}", order_number),
            ),
            (
                "villa",
                format!("villa_{}", order_number),
                distribution.villa.clone(),
                format!("Villa commission for order {}", order_number),
            ),
        ];

        let mut records = Vec::with_capacity(legs.len());
        for (party, reference_id, share, description) in legs {
            match self
                .gateway
                .create_disbursement(DisbursementRequest {
                    reference_id: reference_id.clone(),
                    amount: share.amount.round() as u64,
                    bank: share.bank.clone(),
                    description,
                })
                .await
            {
                Ok(response) => records.push(DisbursementRecord {
                    party: party.to_string(),
                    disbursement_id: response.disbursement_id,
                    reference_id,
                    amount: share.amount,
                    status: response.status,
                    created_at: Utc::now().to_rfc3339(),
                }),
                Err(e) => {
                    error!(
                        target: "orders",
                        order_number = %order_number,
                        party,
                        error = %e,
                        "Disbursement failed"
                    );
                    return self
                        .record_distribution_failure(
                            booking,
                            &format!("{} disbursement failed: {}", party, e),
                        )
                        .await;
                }
            }
        }

        match self.orders.record_disbursements(&order_number, records).await {
            Ok(Some(updated)) => {
                info!(target: "orders", order_number = %order_number, "Funds distributed");
                updated
            }
            Ok(None) => {
                warn!(
                    target: "orders",
                    order_number = %order_number,
                    "Disbursements sent but booking was not in payment_completed"
                );
                booking
            }
            Err(e) => {
                error!(
                    target: "orders",
                    order_number = %order_number,
                    error = %e,
                    "Failed to record disbursements"
                );
                booking
            }
        }
    }

    async fn record_distribution_failure(&self, booking: Booking, reason: &str) -> Booking {
        match self
            .orders
            .record_distribution_error(&booking.order_number, reason)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => booking,
            Err(e) => {
                error!(
                    target: "orders",
                    order_number = %booking.order_number,
                    error = %e,
                    "Failed to record distribution error"
                );
                booking
            }
        }
    }

    /// Build, store and deliver the invoice. Failures are logged; the
    /// payment flow has already succeeded and must not unwind.
    async fn generate_and_deliver_invoice(&self, booking: &Booking) {
        let invoice = match self.invoices.generate(booking).await {
            Ok(invoice) => invoice,
            Err(e) => {
                error!(
                    target: "orders",
                    order_number = %booking.order_number,
                    error = %e,
                    "Invoice generation failed"
                );
                return;
            }
        };

        if let Err(e) = self
            .orders
            .set_invoice(&booking.order_number, invoice.clone())
            .await
        {
            error!(
                target: "orders",
                order_number = %booking.order_number,
                error = %e,
                "Failed to persist invoice record"
            );
        }

        let body = format!(
            "Here is your receipt {} for booking {}.",
            invoice.invoice_number, booking.order_number
        );
        match crate::notify::detect_channel(&booking.sender_id) {
            crate::notify::Channel::Persistent => {
                let payload = whatsapp::cta_url_message(
                    &booking.sender_id,
                    &body,
                    "Download Invoice",
                    &invoice.download_url,
                );
                let fallback =
                    ChannelMessage::new(MessageKind::Invoice, invoice.download_url.clone());
                if let Err(e) = self
                    .router
                    .send_payload(&booking.sender_id, payload, fallback)
                    .await
                {
                    error!(
                        target: "orders",
                        order_number = %booking.order_number,
                        error = %e,
                        "Failed to deliver invoice"
                    );
                }
            }
            crate::notify::Channel::Transient => {
                // The booking is settled; drop the live session after the
                // invoice frame renders.
                self.router
                    .close_after(
                        &booking.sender_id,
                        ChannelMessage::new(MessageKind::Invoice, invoice.download_url.clone()),
                    )
                    .await;
            }
        }
    }

    async fn handle_expired(&self, order_number: &str) -> AppResult<()> {
        let Some(booking) = self.orders.mark_expired(order_number).await? else {
            info!(
                target: "orders",
                order_number,
                "EXPIRED event ignored (not in payment_pending)"
            );
            return Ok(());
        };
        let _ = self
            .router
            .send(
                &booking.sender_id,
                ChannelMessage::new(
                    MessageKind::PaymentExpired,
                    format!(
                        "The payment link for booking {} has expired. \
                         Reply \"Pay\" to get a new one.",
                        order_number
                    ),
                ),
            )
            .await;
        Ok(())
    }

    async fn handle_failed(&self, event: PaymentEvent) -> AppResult<()> {
        let Some(booking) = self
            .orders
            .mark_failed(&event.order_number, event.failure_reason.as_deref())
            .await?
        else {
            info!(
                target: "orders",
                order_number = %event.order_number,
                "FAILED event ignored (not in payment_pending)"
            );
            return Ok(());
        };
        let _ = self
            .router
            .send(
                &booking.sender_id,
                ChannelMessage::new(
                    MessageKind::PaymentFailed,
                    format!(
                        "Your payment for booking {} did not go through. \
                         Reply \"Retry\" to try again.",
                        event.order_number
                    ),
                ),
            )
            .await;
        Ok(())
    }
}

fn claim_prompt_body(booking: &Booking) -> String {
    let mut body = format!(
        "New booking {}: {}",
        booking.order_number, booking.service_name
    );
    if let Some(date) = &booking.booking_date {
        body.push_str(&format!(" on {}", date));
    }
    if let Some(time) = &booking.booking_time {
        body.push_str(&format!(" at {}", time));
    }
    if let Some(persons) = &booking.person_count {
        body.push_str(&format!(" for {} guest(s)", persons));
    }
    body.push_str(&format!(". Price: Rp {}.", booking.price));
    body
}

fn invoice_description(booking: &Booking) -> String {
    match (&booking.booking_date, &booking.booking_time) {
        (Some(date), Some(time)) => {
            format!("Payment for {} on {} at {}", booking.service_name, date, time)
        }
        (Some(date), None) => format!("Payment for {} on {}", booking.service_name, date),
        _ => format!("Payment for {}", booking.service_name),
    }
}

fn build_distribution(
    split: &crate::services::PriceDistribution,
    provider_bank: BankDetails,
    villa_bank: BankDetails,
) -> DistributionData {
    DistributionData {
        service_provider: PartyShare {
            amount: split.service_provider_price as f64,
            bank: provider_bank,
        },
        villa: PartyShare {
            amount: split.villa_price as f64,
            bank: villa_bank,
        },
        total_distribution: (split.service_provider_price + split.villa_price) as f64,
    }
}

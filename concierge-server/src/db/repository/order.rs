//! Booking Repository
//!
//! All booking mutations are single conditional UPDATE statements. A
//! transition whose WHERE clause no longer matches returns zero rows, which
//! callers interpret as "lost the race" or "stale event" rather than as an
//! error. This is what makes the claim race and webhook redelivery safe
//! without any application-side locking.

use super::{BaseRepository, RepoError, RepoResult, now_rfc3339};
use crate::db::models::{Booking, BookingCreate, DisbursementRecord, DistributionData, InvoiceRecord};
use shared::OrderStatus;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "booking";

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Persist a new booking in `pending` state under the given number.
    ///
    /// The unique index on `order_number` turns a duplicate number into a
    /// Duplicate error instead of a second record.
    pub async fn create(&self, order_number: &str, data: BookingCreate) -> RepoResult<Booking> {
        let now = now_rfc3339();
        let booking = Booking {
            id: None,
            order_number: order_number.to_string(),
            sender_id: data.sender_id,
            guest_name: data.guest_name,
            guest_email: data.guest_email,
            service_name: data.service_name,
            service_provider_code: None,
            villa_code: data.villa_code,
            price: data.price,
            original_price: data.original_price,
            discount_amount: data.discount_amount,
            promo_code: data.promo_code,
            booking_date: data.booking_date,
            booking_time: data.booking_time,
            person_count: data.person_count,
            status: OrderStatus::Pending,
            confirmation: false,
            confirmed_by_provider: None,
            confirmed_at: None,
            declined_by: Vec::new(),
            payment: Default::default(),
            invoice: None,
            cancellation_reason: None,
            cancelled_at: None,
            reminder_sent: false,
            created_at: now.clone(),
            updated_at: now,
        };

        let created: Option<Booking> = self
            .base
            .db()
            .create(TABLE)
            .content(booking)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("uniq_order_number") {
                    RepoError::Duplicate(format!("Order number {} already exists", order_number))
                } else {
                    RepoError::Database(msg)
                }
            })?;
        created.ok_or_else(|| RepoError::Database("Failed to create booking".to_string()))
    }

    pub async fn find_by_number(&self, order_number: &str) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM booking WHERE order_number = $number LIMIT 1")
            .bind(("number", number))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Attempt to claim the booking for `provider`.
    ///
    /// Returns the updated booking if this call won, `None` if the booking
    /// was already claimed, is missing, or has left the claimable states.
    /// A `declined` booking is still claimable: declines remove one
    /// provider's interest, they do not end the race. The guard is the
    /// absence of `confirmed_by_provider`, evaluated inside a single UPDATE
    /// so exactly one of any number of concurrent claimants succeeds.
    pub async fn try_claim(
        &self,
        order_number: &str,
        provider: &str,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let provider = provider.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'pending',
                    confirmed_by_provider = $provider,
                    service_provider_code = $provider,
                    confirmation = true,
                    confirmed_at = $now,
                    updated_at = $now
                WHERE order_number = $number
                  AND status IN ['pending', 'declined']
                  AND confirmed_by_provider = NONE
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("provider", provider))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Record a provider's decline.
    ///
    /// The provider is always appended to `declined_by` (analytics keeps
    /// post-claim declines too), but the status only moves to `declined`
    /// while the booking is still unclaimed.
    pub async fn record_decline(
        &self,
        order_number: &str,
        provider: &str,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let provider = provider.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    declined_by = array::union(declined_by, [$provider]),
                    status = IF status = 'pending' AND confirmed_by_provider = NONE
                             THEN 'declined' ELSE status END,
                    updated_at = $now
                WHERE order_number = $number
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("provider", provider))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Attach a freshly issued payment link and move to `payment_pending`.
    ///
    /// Also the retry path: allowed from `pending` (claimed but link
    /// creation previously failed), `payment_expired` and `payment_failed`.
    /// Never from `payment_pending`: a live invoice must be resent, not
    /// replaced, or the gateway would hold two payable invoices at once.
    /// Clears any stale expiry/failure markers from the previous attempt.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_payment_issued(
        &self,
        order_number: &str,
        invoice_id: &str,
        payment_url: &str,
        external_id: &str,
        amount: f64,
        expires_at: &str,
        distribution_data: DistributionData,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let invoice_id = invoice_id.to_string();
        let payment_url = payment_url.to_string();
        let external_id = external_id.to_string();
        let expires_at = expires_at.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'payment_pending',
                    payment.invoice_id = $invoice_id,
                    payment.payment_url = $payment_url,
                    payment.external_id = $external_id,
                    payment.status = 'pending',
                    payment.amount = $amount,
                    payment.expires_at = $expires_at,
                    payment.expired_at = NONE,
                    payment.failed_at = NONE,
                    payment.failure_reason = NONE,
                    payment.distribution_data = $distribution,
                    reminder_sent = false,
                    updated_at = $now
                WHERE order_number = $number
                  AND status IN ['pending', 'payment_expired', 'payment_failed']
                  AND confirmed_by_provider != NONE
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("invoice_id", invoice_id))
            .bind(("payment_url", payment_url))
            .bind(("external_id", external_id))
            .bind(("amount", amount))
            .bind(("expires_at", expires_at))
            .bind(("distribution", distribution_data))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Move to `payment_completed` if and only if payment is pending.
    ///
    /// Returns `None` for redelivered or out-of-order gateway events; the
    /// caller treats that as an acknowledged no-op.
    pub async fn mark_paid(
        &self,
        order_number: &str,
        method: Option<&str>,
        amount: Option<f64>,
        paid_at: &str,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let method = method.map(|m| m.to_string());
        let paid_at = paid_at.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'payment_completed',
                    payment.status = 'completed',
                    payment.method = $method,
                    payment.amount = $amount ?? payment.amount,
                    payment.paid_at = $paid_at,
                    updated_at = $now
                WHERE order_number = $number
                  AND status = 'payment_pending'
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("method", method))
            .bind(("amount", amount))
            .bind(("paid_at", paid_at))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Move to `payment_expired`. No-op unless payment is currently pending,
    /// so an EXPIRED event arriving after PAID never downgrades the booking.
    pub async fn mark_expired(&self, order_number: &str) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'payment_expired',
                    payment.status = 'expired',
                    payment.expired_at = $now,
                    updated_at = $now
                WHERE order_number = $number
                  AND status = 'payment_pending'
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Move to `payment_failed`, with the gateway's reason if it sent one.
    pub async fn mark_failed(
        &self,
        order_number: &str,
        reason: Option<&str>,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let reason = reason.map(|r| r.to_string());
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'payment_failed',
                    payment.status = 'failed',
                    payment.failed_at = $now,
                    payment.failure_reason = $reason,
                    updated_at = $now
                WHERE order_number = $number
                  AND status = 'payment_pending'
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("reason", reason))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Record both payout legs and move to `funds_distributed`.
    pub async fn record_disbursements(
        &self,
        order_number: &str,
        disbursements: Vec<DisbursementRecord>,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'funds_distributed',
                    payment.disbursements = $disbursements,
                    payment.distribution_error = NONE,
                    updated_at = $now
                WHERE order_number = $number
                  AND status = 'payment_completed'
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("disbursements", disbursements))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Record a payout failure. The payment itself stays completed; the
    /// booking is flagged for manual reconciliation.
    pub async fn record_distribution_error(
        &self,
        order_number: &str,
        error: &str,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let error = error.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'distribution_failed',
                    payment.distribution_error = $error,
                    updated_at = $now
                WHERE order_number = $number
                  AND status = 'payment_completed'
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("error", error))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Attach the generated invoice record.
    pub async fn set_invoice(
        &self,
        order_number: &str,
        invoice: InvoiceRecord,
    ) -> RepoResult<Option<Booking>> {
        let number = order_number.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    invoice = $invoice,
                    updated_at = $now
                WHERE order_number = $number
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("invoice", invoice))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Cancel the booking.
    ///
    /// Allowed only before funds arrive. A missing booking is NotFound; a
    /// booking in a non-cancellable state is a Duplicate-style conflict.
    pub async fn cancel(&self, order_number: &str, reason: &str) -> RepoResult<Booking> {
        let number = order_number.to_string();
        let reason = reason.to_string();
        let now = now_rfc3339();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                UPDATE booking SET
                    status = 'cancelled',
                    cancellation_reason = $reason,
                    cancelled_at = $now,
                    updated_at = $now
                WHERE order_number = $number
                  AND status IN ['pending', 'payment_pending']
                RETURN AFTER
                "#,
            )
            .bind(("number", number))
            .bind(("reason", reason))
            .bind(("now", now))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        if let Some(booking) = rows.into_iter().next() {
            return Ok(booking);
        }
        match self.find_by_number(order_number).await? {
            Some(existing) => Err(RepoError::Duplicate(format!(
                "Order {} cannot be cancelled in status {}",
                order_number, existing.status
            ))),
            None => Err(RepoError::NotFound(format!(
                "Order {} not found",
                order_number
            ))),
        }
    }

    /// Booking history for one guest, newest first.
    pub async fn history(
        &self,
        sender_id: &str,
        page: u32,
        limit: u32,
    ) -> RepoResult<Vec<Booking>> {
        let sender = sender_id.to_string();
        let start = page.saturating_sub(1) as i64 * limit as i64;
        let mut result = self
            .base
            .db()
            .query(
                r#"
                SELECT * FROM booking
                WHERE sender_id = $sender
                ORDER BY created_at DESC
                LIMIT $limit START $start
                "#,
            )
            .bind(("sender", sender))
            .bind(("limit", limit as i64))
            .bind(("start", start))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows)
    }

    pub async fn mark_reminder_sent(&self, order_number: &str) -> RepoResult<()> {
        let number = order_number.to_string();
        let now = now_rfc3339();
        self.base
            .db()
            .query(
                r#"
                UPDATE booking SET reminder_sent = true, updated_at = $now
                WHERE order_number = $number
                "#,
            )
            .bind(("number", number))
            .bind(("now", now))
            .await?;
        Ok(())
    }

    /// Bookings stuck in `payment_pending` since before `cutoff` (RFC3339)
    /// and not yet reminded. Automation scan.
    pub async fn payment_pending_older_than(&self, cutoff: &str) -> RepoResult<Vec<Booking>> {
        let cutoff = cutoff.to_string();
        let mut result = self
            .base
            .db()
            .query(
                r#"
                SELECT * FROM booking
                WHERE status = 'payment_pending'
                  AND reminder_sent = false
                  AND updated_at < $cutoff
                "#,
            )
            .bind(("cutoff", cutoff))
            .await?;
        let rows: Vec<Booking> = result.take(0)?;
        Ok(rows)
    }
}

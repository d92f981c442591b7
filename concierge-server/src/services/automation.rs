//! Automation Scanner
//!
//! Hourly sweep over bookings that are waiting on the guest. Currently one
//! rule: a payment reminder for bookings stuck in `payment_pending` past
//! the configured threshold, sent at most once per payment link.

use chrono::{Duration as ChronoDuration, Utc};
use shared::ChannelMessage;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::repository::OrderRepository;
use crate::notify::NotificationRouter;

#[derive(Clone)]
pub struct AutomationService {
    orders: OrderRepository,
    router: NotificationRouter,
    reminder_after_hours: i64,
}

impl AutomationService {
    pub fn new(orders: OrderRepository, router: NotificationRouter, reminder_after_hours: i64) -> Self {
        Self {
            orders,
            router,
            reminder_after_hours,
        }
    }

    /// One sweep. Returns how many reminders went out.
    pub async fn run_once(&self) -> usize {
        let cutoff = (Utc::now() - ChronoDuration::hours(self.reminder_after_hours)).to_rfc3339();
        let stale = match self.orders.payment_pending_older_than(&cutoff).await {
            Ok(bookings) => bookings,
            Err(e) => {
                error!(target: "automation", error = %e, "Reminder scan failed");
                return 0;
            }
        };

        let mut sent = 0;
        for booking in stale {
            let body = match &booking.payment.payment_url {
                Some(url) => format!(
                    "Friendly reminder: your booking {} for {} is still awaiting payment. \
                     Complete it here: {}",
                    booking.order_number, booking.service_name, url
                ),
                None => continue,
            };

            if let Err(e) = self
                .router
                .send(&booking.sender_id, ChannelMessage::text(body))
                .await
            {
                warn!(
                    target: "automation",
                    order_number = %booking.order_number,
                    error = %e,
                    "Failed to send payment reminder"
                );
                continue;
            }
            if let Err(e) = self.orders.mark_reminder_sent(&booking.order_number).await {
                error!(
                    target: "automation",
                    order_number = %booking.order_number,
                    error = %e,
                    "Failed to mark reminder sent"
                );
                continue;
            }
            sent += 1;
        }

        if sent > 0 {
            info!(target: "automation", sent, "Payment reminders sent");
        }
        sent
    }

    /// Periodic loop for the background task manager. Each iteration's
    /// failures are logged and swallowed; the loop only exits on shutdown.
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a restart does not
        // double-remind.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(target: "automation", "Automation scanner stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}

//! End-to-end lifecycle tests against an embedded scratch database.
//!
//! These exercise the invariants the conditional repository updates exist
//! for: one winner per claim race, one settlement per payment, no backward
//! status movement, no cancellation once money is in.

mod common;

use std::collections::HashSet;

use common::{GUEST, Harness, PROVIDER_A, PROVIDER_B};
use concierge_server::db::models::PromoKind;
use concierge_server::orders::{PaymentEvent, PaymentEventStatus};
use concierge_server::utils::AppError;
use shared::{ClaimOutcome, OrderStatus};

fn paid_event(order_number: &str) -> PaymentEvent {
    PaymentEvent {
        order_number: order_number.to_string(),
        status: PaymentEventStatus::Paid,
        method: Some("BANK_TRANSFER".to_string()),
        amount: Some(250_000.0),
        paid_at: Some("2026-09-10T08:00:00Z".to_string()),
        failure_reason: None,
    }
}

#[tokio::test]
async fn order_numbers_are_unique_under_concurrency() {
    let h = Harness::new().await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let lifecycle = h.lifecycle.clone();
        handles.push(tokio::spawn(async move {
            lifecycle
                .create_order(concierge_server::orders::CreateOrderRequest {
                    sender_id: GUEST.to_string(),
                    service_name: common::SERVICE.to_string(),
                    villa_code: Some("villa-9".to_string()),
                    ..Default::default()
                })
                .await
                .expect("create order")
                .order_number
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        assert!(numbers.insert(handle.await.expect("join")));
    }
    assert_eq!(numbers.len(), 10);
}

#[tokio::test]
async fn exactly_one_provider_wins_the_claim_race() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;

    let mut handles = Vec::new();
    for provider in [PROVIDER_A, PROVIDER_B, "628111000003", "628111000004"] {
        let lifecycle = h.lifecycle.clone();
        let number = booking.order_number.clone();
        handles.push(tokio::spawn(async move {
            lifecycle.claim_order(&number, provider).await.expect("claim")
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.expect("join") == ClaimOutcome::Won {
            wins += 1;
        }
    }
    assert_eq!(wins, 1, "claim race must have exactly one winner");

    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.status, OrderStatus::PaymentPending);
    assert!(after.confirmed_by_provider.is_some());
    assert!(after.payment.payment_url.is_some());
    // Only the winner's path reaches the gateway
    assert_eq!(h.gateway.invoice_count(), 1);
}

#[tokio::test]
async fn losing_claim_reports_the_winner() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;

    assert_eq!(
        h.lifecycle
            .claim_order(&booking.order_number, PROVIDER_A)
            .await
            .unwrap(),
        ClaimOutcome::Won
    );
    assert_eq!(
        h.lifecycle
            .claim_order(&booking.order_number, PROVIDER_B)
            .await
            .unwrap(),
        ClaimOutcome::AlreadyClaimed {
            by: PROVIDER_A.to_string()
        }
    );
}

#[tokio::test]
async fn paid_event_settles_distribution_and_invoice() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();

    h.lifecycle
        .handle_payment_event(paid_event(&booking.order_number))
        .await
        .unwrap();

    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.status, OrderStatus::FundsDistributed);
    assert_eq!(after.payment.disbursements.len(), 2);
    assert!(after.invoice.is_some());

    // One leg per payout party, idempotency keys derived from the order
    let legs = h.gateway.disbursements.lock().unwrap();
    assert_eq!(legs.len(), 2);
    let refs: HashSet<_> = legs.iter().map(|d| d.reference_id.clone()).collect();
    assert!(refs.contains(&format!("sp_{}", booking.order_number)));
    assert!(refs.contains(&format!("villa_{}", booking.order_number)));
}

#[tokio::test]
async fn redelivered_paid_event_is_a_noop() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();

    h.lifecycle
        .handle_payment_event(paid_event(&booking.order_number))
        .await
        .unwrap();
    h.lifecycle
        .handle_payment_event(paid_event(&booking.order_number))
        .await
        .unwrap();

    // Second delivery must not disburse or invoice again
    assert_eq!(h.gateway.disbursement_count(), 2);
    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.payment.disbursements.len(), 2);
    assert_eq!(after.status, OrderStatus::FundsDistributed);
}

#[tokio::test]
async fn expired_event_after_paid_does_not_move_status_back() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();
    h.lifecycle
        .handle_payment_event(paid_event(&booking.order_number))
        .await
        .unwrap();

    h.lifecycle
        .handle_payment_event(PaymentEvent {
            order_number: booking.order_number.clone(),
            status: PaymentEventStatus::Expired,
            method: None,
            amount: None,
            paid_at: None,
            failure_reason: None,
        })
        .await
        .unwrap();

    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.status, OrderStatus::FundsDistributed);
}

#[tokio::test]
async fn expired_then_retry_issues_a_fresh_link() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();

    h.lifecycle
        .handle_payment_event(PaymentEvent {
            order_number: booking.order_number.clone(),
            status: PaymentEventStatus::Expired,
            method: None,
            amount: None,
            paid_at: None,
            failure_reason: None,
        })
        .await
        .unwrap();
    let expired = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(expired.status, OrderStatus::PaymentExpired);

    let retried = h.lifecycle.retry_payment(&booking.order_number).await.unwrap();
    assert_eq!(retried.status, OrderStatus::PaymentPending);
    assert!(retried.payment.expired_at.is_none());
    assert_eq!(h.gateway.invoice_count(), 2);
}

#[tokio::test]
async fn retry_before_any_claim_is_refused() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;

    let err = h
        .lifecycle
        .retry_payment(&booking.order_number)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.gateway.invoice_count(), 0);
}

#[tokio::test]
async fn retry_while_the_link_is_live_resends_it_without_a_second_invoice() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();
    let claimed = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    let original_url = claimed.payment.payment_url.clone().unwrap();

    let resent = h
        .lifecycle
        .retry_payment(&booking.order_number)
        .await
        .unwrap();

    assert_eq!(h.gateway.invoice_count(), 1, "the live invoice is reused");
    assert_eq!(resent.payment.payment_url.as_deref(), Some(original_url.as_str()));
    assert_eq!(resent.status, OrderStatus::PaymentPending);
}

#[tokio::test]
async fn cancellation_is_refused_once_paid() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();
    h.lifecycle
        .handle_payment_event(paid_event(&booking.order_number))
        .await
        .unwrap();

    let err = h
        .lifecycle
        .cancel_order(&booking.order_number, "changed my mind")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.status, OrderStatus::FundsDistributed);
}

#[tokio::test]
async fn cancellation_before_payment_succeeds() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;

    let cancelled = h
        .lifecycle
        .cancel_order(&booking.order_number, "guest request")
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("guest request"));

    // A cancelled booking is out of the claim race
    assert_eq!(
        h.lifecycle
            .claim_order(&booking.order_number, PROVIDER_A)
            .await
            .unwrap(),
        ClaimOutcome::NotFound
    );
}

#[tokio::test]
async fn declined_booking_remains_claimable_by_others() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;

    h.lifecycle
        .confirm_decline(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();
    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.status, OrderStatus::Declined);
    assert!(after.declined_by.contains(&PROVIDER_A.to_string()));

    // The other provider can still take it
    assert_eq!(
        h.lifecycle
            .claim_order(&booking.order_number, PROVIDER_B)
            .await
            .unwrap(),
        ClaimOutcome::Won
    );
    let claimed = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(claimed.status, OrderStatus::PaymentPending);
    assert_eq!(claimed.confirmed_by_provider.as_deref(), Some(PROVIDER_B));
}

#[tokio::test]
async fn decline_after_claim_is_recorded_but_does_not_unclaim() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();

    h.lifecycle
        .confirm_decline(&booking.order_number, PROVIDER_B)
        .await
        .unwrap();

    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.status, OrderStatus::PaymentPending);
    assert_eq!(after.confirmed_by_provider.as_deref(), Some(PROVIDER_A));
    assert!(after.declined_by.contains(&PROVIDER_B.to_string()));
}

#[tokio::test]
async fn disbursement_failure_keeps_the_payment_settled() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;
    h.lifecycle
        .claim_order(&booking.order_number, PROVIDER_A)
        .await
        .unwrap();

    h.gateway.fail_disbursements(true);
    h.lifecycle
        .handle_payment_event(paid_event(&booking.order_number))
        .await
        .unwrap();

    let after = h.lifecycle.get_order(&booking.order_number).await.unwrap();
    assert_eq!(after.status, OrderStatus::DistributionFailed);
    assert!(after.payment.distribution_error.is_some());
    // Funds stay in; the payout is reconciled manually, never rolled back
    assert!(after.status.is_paid());
    // The invoice still goes out to the guest
    assert!(after.invoice.is_some());
}

#[tokio::test]
async fn promo_code_discounts_the_order_and_counts_usage() {
    let h = Harness::new().await;
    h.promos
        .create("WELCOME10", PromoKind::Percentage, 10.0, None, Some(5))
        .await
        .unwrap();

    let booking = h
        .lifecycle
        .create_order(concierge_server::orders::CreateOrderRequest {
            sender_id: GUEST.to_string(),
            service_name: common::SERVICE.to_string(),
            villa_code: Some("villa-9".to_string()),
            promo_code: Some("welcome10".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(booking.price, "225000");
    assert_eq!(booking.original_price.as_deref(), Some("250000"));
    assert_eq!(booking.discount_amount, 25_000.0);
    assert_eq!(booking.promo_code.as_deref(), Some("WELCOME10"));

    let promo = h.promos.find_by_code("WELCOME10").await.unwrap().unwrap();
    assert_eq!(promo.current_usage, 1);
}

#[tokio::test]
async fn exhausted_promo_code_is_rejected() {
    let h = Harness::new().await;
    h.promos
        .create("ONCE", PromoKind::Fixed, 50_000.0, None, Some(1))
        .await
        .unwrap();

    let first = h
        .lifecycle
        .create_order(concierge_server::orders::CreateOrderRequest {
            sender_id: GUEST.to_string(),
            service_name: common::SERVICE.to_string(),
            promo_code: Some("ONCE".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.price, "200000");

    let err = h
        .lifecycle
        .create_order(concierge_server::orders::CreateOrderRequest {
            sender_id: GUEST.to_string(),
            service_name: common::SERVICE.to_string(),
            promo_code: Some("ONCE".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn losing_the_promo_race_leaves_no_booking_behind() {
    let h = Harness::new().await;
    h.promos
        .create("LAST1", PromoKind::Fixed, 50_000.0, None, Some(1))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let lifecycle = h.lifecycle.clone();
        handles.push(tokio::spawn(async move {
            lifecycle
                .create_order(concierge_server::orders::CreateOrderRequest {
                    sender_id: GUEST.to_string(),
                    service_name: common::SERVICE.to_string(),
                    villa_code: Some("villa-9".to_string()),
                    promo_code: Some("LAST1".to_string()),
                    ..Default::default()
                })
                .await
                .is_ok()
        }));
    }
    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1, "the usage limit admits exactly one redemption");
    let stored = h.lifecycle.order_history(GUEST, 1, 50).await.unwrap();
    assert_eq!(
        stored.len(),
        successes,
        "a refused redemption must not persist a discounted booking"
    );
}

#[tokio::test]
async fn history_returns_newest_first() {
    let h = Harness::new().await;
    let first = h.create_booking().await;
    let second = h.create_booking().await;

    let page = h.lifecycle.order_history(GUEST, 1, 10).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].order_number, second.order_number);
    assert_eq!(page[1].order_number, first.order_number);

    let limited = h.lifecycle.order_history(GUEST, 1, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].order_number, second.order_number);
}

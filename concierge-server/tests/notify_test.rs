//! Notification delivery tests: durable outbox for phone-number recipients,
//! live frames for web sessions, and the session teardown ordering.

mod common;

use common::{GUEST, Harness, PROVIDER_A, PROVIDER_B};
use shared::{ChannelMessage, MessageKind};
use tokio::sync::mpsc;

#[tokio::test]
async fn claim_prompts_reach_every_provider_through_the_outbox() {
    let h = Harness::new().await;
    let booking = h.create_booking().await;

    let delivered = h.outbox.drain_once().await;
    assert_eq!(delivered, 3, "two provider prompts plus the guest ack");

    for provider in [PROVIDER_A, PROVIDER_B] {
        let payloads = h.sender.sent_to(provider);
        assert_eq!(payloads.len(), 1, "one claim prompt per provider");
        let buttons = payloads[0]
            .pointer("/interactive/action/buttons")
            .and_then(|b| b.as_array())
            .expect("button payload");
        let ids: Vec<&str> = buttons
            .iter()
            .filter_map(|b| b.pointer("/reply/id").and_then(|i| i.as_str()))
            .collect();
        assert!(ids.contains(&format!("accept_{}", booking.order_number).as_str()));
        assert!(ids.contains(&format!("decline_{}", booking.order_number).as_str()));
    }

    let guest_payloads = h.sender.sent_to(GUEST);
    assert_eq!(guest_payloads.len(), 1);

    // Everything delivered; nothing left to drain
    assert_eq!(h.outbox.drain_once().await, 0);
}

#[tokio::test]
async fn web_session_messages_bypass_the_outbox() {
    let h = Harness::new().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.connections.connect("web_abc123", tx);

    h.router
        .send("web_abc123", ChannelMessage::text("hello"))
        .await
        .unwrap();

    let frame = rx.try_recv().expect("live delivery");
    assert_eq!(frame, ChannelMessage::text("hello"));

    // Nothing was queued durably for a transient recipient
    assert_eq!(h.outbox.drain_once().await, 0);
}

#[tokio::test]
async fn offline_web_session_frames_flush_on_connect() {
    let h = Harness::new().await;

    h.router
        .send("web_abc123", ChannelMessage::text("first"))
        .await
        .unwrap();
    h.router
        .send("web_abc123", ChannelMessage::text("second"))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    h.connections.connect("web_abc123", tx);

    assert_eq!(rx.try_recv().unwrap(), ChannelMessage::text("first"));
    assert_eq!(rx.try_recv().unwrap(), ChannelMessage::text("second"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn close_after_sends_the_final_frame_then_destroy() {
    let h = Harness::new().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.connections.connect("web_abc123", tx);

    h.router
        .close_after(
            "web_abc123",
            ChannelMessage::new(MessageKind::Invoice, "https://files.test/invoice.html"),
        )
        .await;

    let first = rx.try_recv().unwrap();
    assert_eq!(first.kind, MessageKind::Invoice);
    let second = rx.try_recv().unwrap();
    assert_eq!(second.kind, MessageKind::Destroy);
}

#[tokio::test]
async fn close_after_is_a_noop_for_phone_recipients() {
    let h = Harness::new().await;

    h.router
        .close_after(GUEST, ChannelMessage::text("bye"))
        .await;

    // No destroy frames on the durable channel
    assert_eq!(h.outbox.drain_once().await, 0);
    assert!(h.sender.sent_to(GUEST).is_empty());
}

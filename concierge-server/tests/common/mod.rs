//! Shared test fixtures: an embedded scratch database plus in-memory stand-ins
//! for the payment gateway, pricing service and messaging platform.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tempfile::TempDir;

use concierge_server::db::DbService;
use concierge_server::db::models::BankDetails;
use concierge_server::db::repository::{
    OrderRepository, OutboxRepository, PromoRepository, SequenceRepository,
};
use concierge_server::notify::{ConnectionManager, NotificationRouter};
use concierge_server::orders::OrderLifecycle;
use concierge_server::services::{
    DisbursementRequest, DisbursementResponse, GatewayError, InvoiceRequest, InvoiceResponse,
    InvoiceService, MessageSender, ObjectStorage, OutboxService, PaymentGateway, PriceDistribution,
    PricingResolver, PromoService, ServiceListing,
};
use concierge_server::utils::AppResult;

pub const SERVICE: &str = "Balinese Massage";
pub const PROVIDER_A: &str = "628111000001";
pub const PROVIDER_B: &str = "628111000002";
pub const GUEST: &str = "628199999999";

fn test_bank(holder: &str) -> BankDetails {
    BankDetails {
        bank_code: "BCA".to_string(),
        account_number: "1234567890".to_string(),
        account_holder_name: holder.to_string(),
    }
}

// ========== Pricing stub ==========

pub struct StubPricing;

#[async_trait]
impl PricingResolver for StubPricing {
    async fn list_services(&self) -> AppResult<Vec<ServiceListing>> {
        Ok(vec![ServiceListing {
            id: "svc_massage".to_string(),
            title: SERVICE.to_string(),
            description: "90 minutes".to_string(),
            price_display: "Rp 250.000".to_string(),
        }])
    }

    async fn base_price(&self, _service: &str) -> AppResult<String> {
        Ok("Rp 250.000".to_string())
    }

    async fn price_distribution(&self, _service: &str) -> AppResult<PriceDistribution> {
        Ok(PriceDistribution {
            service_provider_price: 200_000,
            villa_price: 50_000,
        })
    }

    async fn provider_bank(&self, code: &str) -> AppResult<Option<BankDetails>> {
        Ok(Some(test_bank(code)))
    }

    async fn villa_bank(&self, code: &str) -> AppResult<Option<BankDetails>> {
        Ok(Some(test_bank(code)))
    }

    async fn providers_for(&self, _service: &str) -> AppResult<Vec<String>> {
        Ok(vec![PROVIDER_A.to_string(), PROVIDER_B.to_string()])
    }
}

// ========== Payment gateway mock ==========

#[derive(Default)]
pub struct MockGateway {
    invoice_count: AtomicUsize,
    pub disbursements: Mutex<Vec<DisbursementRequest>>,
    fail_disbursements: AtomicBool,
}

impl MockGateway {
    pub fn invoice_count(&self) -> usize {
        self.invoice_count.load(Ordering::SeqCst)
    }

    pub fn disbursement_count(&self) -> usize {
        self.disbursements.lock().unwrap().len()
    }

    pub fn fail_disbursements(&self, fail: bool) {
        self.fail_disbursements.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_invoice(&self, req: InvoiceRequest) -> Result<InvoiceResponse, GatewayError> {
        let n = self.invoice_count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(InvoiceResponse {
            invoice_id: format!("inv_{}_{}", req.external_id, n),
            payment_url: format!("https://pay.test/{}", req.external_id),
            expires_at: (Utc::now() + Duration::hours(24)).to_rfc3339(),
        })
    }

    async fn create_disbursement(
        &self,
        req: DisbursementRequest,
    ) -> Result<DisbursementResponse, GatewayError> {
        if self.fail_disbursements.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "INSUFFICIENT_BALANCE".to_string(),
            });
        }
        let id = format!("disb_{}", req.reference_id);
        self.disbursements.lock().unwrap().push(req);
        Ok(DisbursementResponse {
            disbursement_id: id,
            status: "PENDING".to_string(),
        })
    }
}

// ========== Messaging recorder ==========

/// Records every persistent-channel payload instead of calling the platform.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, Value)>>,
}

impl RecordingSender {
    pub fn sent_to(&self, recipient: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == recipient)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, recipient: &str, payload: Value) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), payload));
        Ok(())
    }
}

// ========== Object storage stub ==========

pub struct StubStorage;

#[async_trait]
impl ObjectStorage for StubStorage {
    async fn put(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> AppResult<String> {
        Ok(format!("https://files.test/{}", key))
    }
}

// ========== Harness ==========

pub struct Harness {
    _tmp: TempDir,
    pub orders: OrderRepository,
    pub outbox: OutboxService,
    pub lifecycle: OrderLifecycle,
    pub gateway: Arc<MockGateway>,
    pub sender: Arc<RecordingSender>,
    pub connections: Arc<ConnectionManager>,
    pub router: NotificationRouter,
    pub promos: PromoRepository,
}

impl Harness {
    pub async fn new() -> Self {
        let tmp = TempDir::new().expect("temp dir");
        let db_path = tmp.path().join("concierge.db");
        let db = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("open scratch database")
            .db();

        let orders = OrderRepository::new(db.clone());
        let sequences = SequenceRepository::new(db.clone());
        let promos = PromoRepository::new(db.clone());
        let outbox_repo = OutboxRepository::new(db.clone());

        let gateway = Arc::new(MockGateway::default());
        let sender = Arc::new(RecordingSender::default());
        let pricing = Arc::new(StubPricing);

        let outbox = OutboxService::new(outbox_repo, sender.clone());
        let connections = Arc::new(ConnectionManager::new());
        let router = NotificationRouter::new(connections.clone(), outbox.clone());

        let lifecycle = OrderLifecycle::new(
            orders.clone(),
            sequences,
            pricing,
            gateway.clone(),
            PromoService::new(promos.clone()),
            InvoiceService::new(Arc::new(StubStorage)),
            router.clone(),
            "http://localhost:3000".to_string(),
            86_400,
        );

        Self {
            _tmp: tmp,
            orders,
            outbox,
            lifecycle,
            gateway,
            sender,
            connections,
            router,
            promos,
        }
    }

    /// Create a booking for the default guest and service.
    pub async fn create_booking(&self) -> concierge_server::db::models::Booking {
        self.lifecycle
            .create_order(concierge_server::orders::CreateOrderRequest {
                sender_id: GUEST.to_string(),
                service_name: SERVICE.to_string(),
                villa_code: Some("villa-9".to_string()),
                booking_date: Some("2026-09-15".to_string()),
                booking_time: Some("14:00".to_string()),
                person_count: Some("2".to_string()),
                guest_name: Some("Alex Tan".to_string()),
                guest_email: Some("alex@example.com".to_string()),
                promo_code: None,
            })
            .await
            .expect("create booking")
    }
}

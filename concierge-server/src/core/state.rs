use std::sync::Arc;
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db::DbService;
use crate::db::repository::{
    OrderRepository, OutboxRepository, PromoRepository, SequenceRepository, SessionRepository,
};
use crate::flow::{FlowCrypto, FlowHandler};
use crate::notify::{ConnectionManager, NotificationRouter};
use crate::orders::OrderLifecycle;
use crate::services::{
    AutomationService, HttpObjectStorage, HttpPaymentGateway, HttpPricingResolver, InvoiceService,
    MessageSender, ObjectStorage, OutboxService, PaymentGateway, PricingResolver, PromoService,
    WhatsAppClient,
};
use crate::utils::retry::RetryPolicy;
use crate::utils::{AppError, AppResult};

/// Server state: shared references to every singleton service.
///
/// Cloning is shallow; everything heavy lives behind an `Arc` or is itself
/// a handle (the SurrealDB client, repositories).
///
/// | Field | Role |
/// |-------|------|
/// | config | Immutable configuration |
/// | db | Embedded database handle |
/// | connections | Live WebSocket session registry |
/// | router | Channel-aware notification delivery |
/// | lifecycle | Order state machine orchestrator |
/// | flow_crypto | RSA key for the encrypted Flow channel |
/// | flow_handler | Flow screen logic |
/// | sessions | Conversation-scratch session store |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: Surreal<Db>,
    pub connections: Arc<ConnectionManager>,
    pub router: NotificationRouter,
    pub lifecycle: OrderLifecycle,
    /// `None` when no key file is configured; the Flow endpoint then
    /// rejects encrypted traffic.
    pub flow_crypto: Option<Arc<FlowCrypto>>,
    pub flow_handler: FlowHandler,
    pub sessions: SessionRepository,
    outbox: OutboxService,
    automation: AutomationService,
}

impl ServerState {
    /// Initialize in dependency order: working directory, database, external
    /// adapters, then the lifecycle orchestrator that ties them together.
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let db_dir = config.database_dir();
        std::fs::create_dir_all(&db_dir)
            .map_err(|e| AppError::internal(format!("Failed to create {}: {}", db_dir.display(), e)))?;
        let db_path = db_dir.join("concierge.db");

        let db_service = DbService::new(&db_path.to_string_lossy())
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {}", e)))?;
        let db = db_service.db();

        let pricing = Arc::new(HttpPricingResolver::new(config.menu_service_url.clone()));
        let gateway = Arc::new(HttpPaymentGateway::new(
            config.payment_api_url.clone(),
            config.payment_secret_key.clone(),
            RetryPolicy {
                max_attempts: config.gateway_max_retries,
                base_delay: Duration::from_secs(1),
            },
            config.gateway_timeout,
        ));
        let sender = Arc::new(WhatsAppClient::new(
            config.whatsapp_api_url.clone(),
            config.whatsapp_access_token.clone(),
        ));
        let storage = Arc::new(HttpObjectStorage::new(
            config.storage_endpoint.clone(),
            config.storage_bucket.clone(),
            config.storage_access_token.clone(),
            config.storage_public_url.clone(),
        ));

        let flow_crypto = Self::load_flow_key(config)?;

        Ok(Self::assemble(
            config.clone(),
            db,
            pricing,
            gateway,
            sender,
            storage,
            flow_crypto,
        ))
    }

    /// Wire the state from an open database and the external adapters.
    /// `initialize` hands in the HTTP adapters; tests hand in stand-ins.
    pub fn assemble(
        config: Config,
        db: Surreal<Db>,
        pricing: Arc<dyn PricingResolver>,
        gateway: Arc<dyn PaymentGateway>,
        sender: Arc<dyn MessageSender>,
        storage: Arc<dyn ObjectStorage>,
        flow_crypto: Option<Arc<FlowCrypto>>,
    ) -> Self {
        let orders = OrderRepository::new(db.clone());
        let sequences = SequenceRepository::new(db.clone());
        let sessions = SessionRepository::new(db.clone());
        let promo_repo = PromoRepository::new(db.clone());
        let outbox_repo = OutboxRepository::new(db.clone());

        let outbox = OutboxService::new(outbox_repo, sender);
        let connections = Arc::new(ConnectionManager::new());
        let router = NotificationRouter::new(connections.clone(), outbox.clone());

        let lifecycle = OrderLifecycle::new(
            orders.clone(),
            sequences,
            pricing.clone(),
            gateway,
            PromoService::new(promo_repo),
            InvoiceService::new(storage),
            router.clone(),
            config.public_base_url.clone(),
            config.invoice_duration_secs,
        );

        let automation =
            AutomationService::new(orders, router.clone(), config.reminder_after_hours);
        let flow_handler = FlowHandler::new(pricing);

        Self {
            config,
            db,
            connections,
            router,
            lifecycle,
            flow_crypto,
            flow_handler,
            sessions,
            outbox,
            automation,
        }
    }

    fn load_flow_key(config: &Config) -> AppResult<Option<Arc<FlowCrypto>>> {
        let path = config.flow_private_key_path.trim();
        if path.is_empty() {
            tracing::warn!("No Flow private key configured; Flow channel disabled");
            return Ok(None);
        }
        let pem = match std::fs::read_to_string(path) {
            Ok(pem) => pem,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path, "Flow private key file not found; Flow channel disabled");
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::internal(format!(
                    "Failed to read Flow private key {}: {}",
                    path, e
                )));
            }
        };
        let crypto = FlowCrypto::from_pem(&pem, config.flow_private_key_passphrase.as_deref())
            .map_err(|e| AppError::internal(format!("Failed to load Flow private key: {}", e)))?;
        tracing::info!(path, "Flow private key loaded");
        Ok(Some(Arc::new(crypto)))
    }

    /// Register the long-running loops. Must be called before `Server::run()`
    /// hands the state to axum.
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let shutdown = tasks.shutdown_token();
        let outbox = self.outbox.clone();
        let poll = Duration::from_secs(self.config.outbox_poll_secs);
        tasks.spawn("outbox_drainer", TaskKind::Worker, async move {
            outbox.run(poll, shutdown).await;
        });

        let shutdown = tasks.shutdown_token();
        let automation = self.automation.clone();
        let interval = Duration::from_secs(self.config.automation_interval_secs);
        tasks.spawn("payment_reminders", TaskKind::Periodic, async move {
            automation.run(interval, shutdown).await;
        });

        let shutdown = tasks.shutdown_token();
        let sessions = self.sessions.clone();
        let ttl_hours = self.config.session_ttl_hours;
        tasks.spawn("session_purge", TaskKind::Periodic, async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = ticker.tick() => {
                        match sessions.purge_expired(ttl_hours).await {
                            Ok(0) => {}
                            Ok(n) => tracing::info!(purged = n, "Expired session fields removed"),
                            Err(e) => tracing::error!(error = %e, "Session purge failed"),
                        }
                    }
                }
            }
        });

        tasks.log_summary();
    }

    pub fn get_db(&self) -> Surreal<Db> {
        self.db.clone()
    }
}

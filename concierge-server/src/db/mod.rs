//! Database Module
//!
//! Embedded SurrealDB (RocksDB backend) with document-model repositories.

pub mod models;
pub mod repository;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};

/// Database service wrapping the embedded SurrealDB instance.
#[derive(Clone, Debug)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open (or create) the database at the given path.
    pub async fn new(path: &str) -> Result<Self, surrealdb::Error> {
        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns("concierge").use_db("main").await?;
        Self::define_schema(&db).await?;
        Ok(Self { db })
    }

    /// Define indexes and constraints. Idempotent, runs at every startup.
    async fn define_schema(db: &Surreal<Db>) -> Result<(), surrealdb::Error> {
        db.query(
            r#"
            DEFINE INDEX IF NOT EXISTS uniq_order_number ON TABLE booking FIELDS order_number UNIQUE;
            DEFINE INDEX IF NOT EXISTS idx_booking_sender ON TABLE booking FIELDS sender_id;
            DEFINE INDEX IF NOT EXISTS idx_booking_status ON TABLE booking FIELDS status;
            DEFINE INDEX IF NOT EXISTS uniq_promo_code ON TABLE promo_code FIELDS code UNIQUE;
            DEFINE INDEX IF NOT EXISTS idx_outbox_status ON TABLE outbox FIELDS status;
            "#,
        )
        .await?;
        Ok(())
    }

    pub fn db(&self) -> Surreal<Db> {
        self.db.clone()
    }
}

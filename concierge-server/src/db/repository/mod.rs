//! Repository Module
//!
//! Document-model access to the embedded SurrealDB tables. Every state
//! transition is a single conditional `UPDATE ... WHERE ... RETURN AFTER`
//! statement so concurrent writers race inside the database, not in
//! application code.

// Bookings
pub mod order;
pub mod sequence;

// Marketing
pub mod promo;

// Conversation state
pub mod session;

// Messaging
pub mod outbox;

// Re-exports
pub use order::OrderRepository;
pub use outbox::OutboxRepository;
pub use promo::PromoRepository;
pub use sequence::SequenceRepository;
pub use session::SessionRepository;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}

/// Current time in the canonical stored form (RFC3339 UTC).
///
/// Timestamps are stored as strings so conditional WHERE clauses can compare
/// them lexicographically with bound parameters.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

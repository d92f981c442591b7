//! Sequence Repository
//!
//! Monotonic counters backed by the `counter` table. One record per sequence
//! name, incremented with a single UPSERT so concurrent callers can never
//! observe the same value twice.

use super::{BaseRepository, RepoError, RepoResult};
use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const ORDER_SEQUENCE: &str = "order_number";
const ORDER_PREFIX: &str = "EB";

#[derive(Debug, Deserialize)]
struct CounterRow {
    value: u64,
}

#[derive(Clone)]
pub struct SequenceRepository {
    base: BaseRepository,
}

impl SequenceRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Atomically increment the named counter and return the new value.
    ///
    /// The first call for a name creates the record and returns 1.
    pub async fn next(&self, name: &str) -> RepoResult<u64> {
        let name = name.to_string();
        let mut result = self
            .base
            .db()
            .query("UPSERT type::thing('counter', $name) SET value += 1 RETURN AFTER")
            .bind(("name", name.clone()))
            .await?;
        let rows: Vec<CounterRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|r| r.value)
            .ok_or_else(|| RepoError::Database(format!("Counter '{}' upsert returned no row", name)))
    }

    /// Next booking number, e.g. "EB42".
    pub async fn next_order_number(&self) -> RepoResult<String> {
        let n = self.next(ORDER_SEQUENCE).await?;
        Ok(format!("{}{}", ORDER_PREFIX, n))
    }
}

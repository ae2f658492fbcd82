//! Durable tier: the system of record for posts

mod postgres;
mod rocks;

pub use postgres::PostgresStore;
pub use rocks::RocksStore;

use crate::config::{DurableBackend, DurableConfig};
use crate::error::DurableError;
use crate::record::Record;
use async_trait::async_trait;
use std::sync::Arc;

/// Contract every durable backend implements.
///
/// `insert` is a plain insert: a second insert for the same id must fail
/// with [`DurableError::Conflict`] instead of overwriting the stored row.
#[async_trait]
pub trait DurableTier: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Record>, DurableError>;

    async fn insert(&self, record: &Record) -> Result<(), DurableError>;

    /// Create the schema if it does not exist yet. Idempotent.
    async fn provision(&self) -> Result<(), DurableError> {
        Ok(())
    }

    /// Release connections and flush buffered writes
    fn close(&self) {}
}

/// Open the configured durable backend
pub fn open(config: &DurableConfig) -> Result<Arc<dyn DurableTier>, DurableError> {
    let store: Arc<dyn DurableTier> = match config.backend {
        DurableBackend::Postgres => Arc::new(PostgresStore::connect(config)?),
        DurableBackend::RocksDb => Arc::new(RocksStore::open(config)?),
    };
    Ok(store)
}

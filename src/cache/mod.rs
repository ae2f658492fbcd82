//! Cache tier: fast, expiring key-value projection of the durable store

mod memcached;

pub use memcached::MemcachedCache;

use crate::error::CacheError;
use crate::record::Record;
use async_trait::async_trait;
use std::time::Duration;

/// Contract every cache backend implements.
///
/// `get` returns `Ok(None)` both for a real miss and for an entry that no
/// longer decodes as a [`Record`]; the cache is advisory, so an unreadable
/// entry is simply not there.
#[async_trait]
pub trait CacheTier: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Record>, CacheError>;

    /// Store `record` under `post:<id>`, replacing any previous entry
    async fn set(&self, record: &Record, ttl: Duration) -> Result<(), CacheError>;
}

//! # readthrough
//!
//! Read-through cache for posts: a lookup checks a memcached cache, falls
//! back to a durable store (PostgreSQL or RocksDB), and finally asks an HTTP
//! origin, promoting the record into every faster tier on the way back.
//!
//! ## Features
//!
//! - Tiered lookup with cumulative promotion and a fixed cache TTL
//! - Duplicate-insert races on the durable tier resolved by re-reading
//! - Typed failures: origin unavailable, malformed payload, tier unavailable
//! - Memcached ASCII front-end (`get post:<id>`, `stats`, `version`)
//! - Prometheus metrics and health check endpoints
//!
//! ## Example
//!
//! ```ignore
//! use readthrough::prelude::*;
//!
//! let config = Config::default();
//! let cache = Arc::new(MemcachedCache::connect(&config.cache).await?);
//! let durable = readthrough::storage::open(&config.durable)?;
//! durable.provision().await?;
//! let origin = Arc::new(HttpOrigin::new(&config.origin)?);
//!
//! let resolver = Resolver::new(cache, durable, origin, config.cache.ttl());
//! let post = resolver.resolve(5).await?.record;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────────┐     ┌───────────┐
//! │ client       │────▶│ readthrough         │────▶│ memcached │  cache (TTL)
//! │ (memcache    │     │  ├─ ASCII front-end │     └───────────┘
//! │  protocol)   │     │  └─ Resolver        │────▶┌───────────┐
//! └──────────────┘     └─────────────────────┘     │ postgres/ │  durable
//!                                │                 │ rocksdb   │
//!                                │                 └───────────┘
//!                                └────────────────▶ HTTP origin
//! ```

// Modules
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod origin;
pub mod prelude;
pub mod protocol;
pub mod record;
pub mod resolver;
pub mod server;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use error::{
    CacheError, DurableError, OriginError, ProtocolError, ReadThroughError, ResolveError, Result,
};
pub use record::Record;
pub use resolver::{Outcome, Resolution, Resolver};

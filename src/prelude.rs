//! Prelude module for common imports.
//!
//! # Usage
//!
//! ```ignore
//! use readthrough::prelude::*;
//! ```

// Error types
pub use crate::error::{
    CacheError, DurableError, OriginError, ProtocolError, ReadThroughError, ResolveError, Result,
};

// Configuration
pub use crate::config::{
    CacheConfig, Config, DurableBackend, DurableConfig, MetricsConfig, OriginConfig, ServerConfig,
};

// Tiers
pub use crate::cache::{CacheTier, MemcachedCache};
pub use crate::origin::{HttpOrigin, OriginSource};
pub use crate::storage::{DurableTier, PostgresStore, RocksStore};

// Lookup
pub use crate::record::Record;
pub use crate::resolver::{Outcome, Resolution, Resolver};

// Metrics
pub use crate::metrics::Metrics;

// Server
pub use crate::server::Server;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};

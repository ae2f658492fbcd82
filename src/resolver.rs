//! Tiered read-through lookup
//!
//! ```text
//!  resolve(id)
//!     │
//!     ▼
//!  ┌────────┐ miss ┌──────────┐ miss ┌────────┐
//!  │ cache  │─────▶│ durable  │─────▶│ origin │
//!  └────────┘      └──────────┘      └────────┘
//!     ▲   promote      ▲   promote       │
//!     └────────────────┴─────────────────┘
//! ```
//!
//! Each tier is wrapped in a [`Layer`] with the same probe/promote contract.
//! The resolver walks the layers in order and stops at the first hit; the
//! record is then promoted into every faster layer, slowest first, before it
//! is returned.

use crate::cache::CacheTier;
use crate::error::{DurableError, OriginError, ResolveError};
use crate::metrics::Metrics;
use crate::origin::OriginSource;
use crate::record::Record;
use crate::storage::DurableTier;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Which tier served a resolved record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Cache,
    Durable,
    Origin,
}

/// A resolved record and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: Record,
    pub outcome: Outcome,
}

#[async_trait]
trait Layer: Send + Sync {
    fn outcome(&self) -> Outcome;

    /// `Ok(None)` is a miss, which is a step and not a failure
    async fn probe(&self, id: i64) -> Result<Option<Record>, ResolveError>;

    /// Store a record found in a slower layer. Returns `Some` with this
    /// layer's own copy when it already held one; that copy wins.
    async fn promote(&self, record: &Record) -> Result<Option<Record>, ResolveError>;
}

struct CacheLayer {
    tier: Arc<dyn CacheTier>,
    ttl: Duration,
}

#[async_trait]
impl Layer for CacheLayer {
    fn outcome(&self) -> Outcome {
        Outcome::Cache
    }

    async fn probe(&self, id: i64) -> Result<Option<Record>, ResolveError> {
        self.tier
            .get(id)
            .await
            .map_err(|source| ResolveError::CacheUnavailable { id, source })
    }

    async fn promote(&self, record: &Record) -> Result<Option<Record>, ResolveError> {
        self.tier
            .set(record, self.ttl)
            .await
            .map_err(|source| ResolveError::CacheUnavailable { id: record.id, source })?;
        Ok(None)
    }
}

struct DurableLayer {
    tier: Arc<dyn DurableTier>,
    metrics: Option<Arc<Metrics>>,
}

#[async_trait]
impl Layer for DurableLayer {
    fn outcome(&self) -> Outcome {
        Outcome::Durable
    }

    async fn probe(&self, id: i64) -> Result<Option<Record>, ResolveError> {
        self.tier
            .get(id)
            .await
            .map_err(|source| ResolveError::DurableUnavailable { id, source })
    }

    async fn promote(&self, record: &Record) -> Result<Option<Record>, ResolveError> {
        let id = record.id;
        match self.tier.insert(record).await {
            Ok(()) => Ok(None),
            Err(DurableError::Conflict(_)) => {
                // Another resolve inserted first; its row is canonical
                debug!(id, "Durable insert conflict, re-reading existing row");
                if let Some(metrics) = &self.metrics {
                    metrics.durable_conflicts.inc();
                }
                match self.probe(id).await? {
                    Some(existing) => Ok(Some(existing)),
                    None => Err(ResolveError::DurableUnavailable {
                        id,
                        source: DurableError::Internal(
                            "conflicting row is not readable".to_string(),
                        ),
                    }),
                }
            }
            Err(source) => Err(ResolveError::DurableUnavailable { id, source }),
        }
    }
}

struct OriginLayer {
    source: Arc<dyn OriginSource>,
}

#[async_trait]
impl Layer for OriginLayer {
    fn outcome(&self) -> Outcome {
        Outcome::Origin
    }

    async fn probe(&self, id: i64) -> Result<Option<Record>, ResolveError> {
        self.source
            .fetch(id)
            .await
            .map(Some)
            .map_err(|err| ResolveError::from_origin(id, err))
    }

    async fn promote(&self, _record: &Record) -> Result<Option<Record>, ResolveError> {
        // Nothing is slower than the origin
        Ok(None)
    }
}

/// Read-through resolver over cache, durable store and origin
pub struct Resolver {
    layers: Vec<Box<dyn Layer>>,
    metrics: Option<Arc<Metrics>>,
}

impl Resolver {
    /// Build a resolver from tier handles acquired by the caller
    pub fn new(
        cache: Arc<dyn CacheTier>,
        durable: Arc<dyn DurableTier>,
        origin: Arc<dyn OriginSource>,
        ttl: Duration,
    ) -> Self {
        Self::build(cache, durable, origin, ttl, None)
    }

    /// Same as [`Resolver::new`], counting outcomes into `metrics`
    pub fn with_metrics(
        cache: Arc<dyn CacheTier>,
        durable: Arc<dyn DurableTier>,
        origin: Arc<dyn OriginSource>,
        ttl: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::build(cache, durable, origin, ttl, Some(metrics))
    }

    fn build(
        cache: Arc<dyn CacheTier>,
        durable: Arc<dyn DurableTier>,
        origin: Arc<dyn OriginSource>,
        ttl: Duration,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(CacheLayer { tier: cache, ttl }),
            Box::new(DurableLayer {
                tier: durable,
                metrics: metrics.clone(),
            }),
            Box::new(OriginLayer { source: origin }),
        ];

        Self { layers, metrics }
    }

    /// Resolve a post by id
    pub async fn resolve(&self, id: i64) -> Result<Resolution, ResolveError> {
        let start = Instant::now();
        let result = self.lookup(id).await;

        match &result {
            Ok(resolution) => {
                debug!(id, outcome = ?resolution.outcome, "Resolved");
            }
            Err(e) => {
                warn!(id, kind = e.kind(), error = %e, "Resolve failed");
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.resolve_latency.observe(start.elapsed().as_secs_f64());
            match &result {
                Ok(resolution) => metrics.record_outcome(resolution.outcome),
                Err(e) => metrics.record_failure(e),
            }
        }

        result
    }

    async fn lookup(&self, id: i64) -> Result<Resolution, ResolveError> {
        for (depth, layer) in self.layers.iter().enumerate() {
            let Some(mut record) = layer.probe(id).await? else {
                continue;
            };
            let mut outcome = layer.outcome();

            for faster in self.layers[..depth].iter().rev() {
                if let Some(existing) = faster.promote(&record).await? {
                    record = existing;
                    outcome = faster.outcome();
                }
            }

            return Ok(Resolution { record, outcome });
        }

        // The origin layer never reports a miss
        Err(ResolveError::from_origin(id, OriginError::Status(404)))
    }
}

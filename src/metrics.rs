//! Prometheus metrics for readthrough

use crate::error::ResolveError;
use crate::resolver::Outcome;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use prometheus::core::Collector;
use tracing::warn;

/// Global metrics instance
pub struct Metrics {
    pub registry: Registry,

    // Resolve outcomes
    pub cache_hits: IntCounter,
    pub durable_hits: IntCounter,
    pub origin_hits: IntCounter,
    pub durable_conflicts: IntCounter,

    // Resolve failures by kind
    pub origin_unavailable: IntCounter,
    pub malformed_payloads: IntCounter,
    pub durable_unavailable: IntCounter,
    pub cache_unavailable: IntCounter,

    pub resolve_latency: Histogram,

    // Front-end
    pub cmd_get: IntCounter,
    pub active_connections: IntGauge,
    pub total_connections: IntCounter,
    pub rejected_connections: IntCounter,
    pub bytes_read: IntCounter,
    pub bytes_written: IntCounter,
    pub protocol_errors: IntCounter,
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric names are unique");
    collector
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    register(
        registry,
        IntCounter::new(name, help).expect("metric name is valid"),
    )
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();
        let r = &registry;

        let resolve_latency = register(
            r,
            Histogram::with_opts(
                HistogramOpts::new(
                    "readthrough_resolve_latency_seconds",
                    "Resolve latency in seconds",
                )
                .buckets(vec![
                    0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
                    2.5, 5.0,
                ]),
            )
            .expect("metric name is valid"),
        );

        let active_connections = register(
            r,
            IntGauge::new(
                "readthrough_active_connections",
                "Current active connections",
            )
            .expect("metric name is valid"),
        );

        Self {
            cache_hits: counter(r, "readthrough_cache_hits_total", "Lookups served by the cache tier"),
            durable_hits: counter(r, "readthrough_durable_hits_total", "Lookups served by the durable tier"),
            origin_hits: counter(r, "readthrough_origin_hits_total", "Lookups served by the origin"),
            durable_conflicts: counter(
                r,
                "readthrough_durable_conflicts_total",
                "Duplicate durable inserts resolved by re-reading",
            ),
            origin_unavailable: counter(
                r,
                "readthrough_origin_unavailable_total",
                "Lookups failed because the origin could not be reached",
            ),
            malformed_payloads: counter(
                r,
                "readthrough_malformed_payloads_total",
                "Lookups failed on an invalid origin payload",
            ),
            durable_unavailable: counter(
                r,
                "readthrough_durable_unavailable_total",
                "Lookups failed on a durable tier error",
            ),
            cache_unavailable: counter(
                r,
                "readthrough_cache_unavailable_total",
                "Lookups failed on a cache tier error",
            ),
            resolve_latency,
            cmd_get: counter(r, "readthrough_cmd_get_total", "Total GET commands"),
            active_connections,
            total_connections: counter(r, "readthrough_connections_total", "Total connections accepted"),
            rejected_connections: counter(
                r,
                "readthrough_rejected_connections_total",
                "Total connections rejected",
            ),
            bytes_read: counter(r, "readthrough_bytes_read_total", "Total bytes read"),
            bytes_written: counter(r, "readthrough_bytes_written_total", "Total bytes written"),
            protocol_errors: counter(r, "readthrough_protocol_errors_total", "Total protocol errors"),
            registry,
        }
    }

    /// Count a successful resolve
    pub fn record_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::Cache => self.cache_hits.inc(),
            Outcome::Durable => self.durable_hits.inc(),
            Outcome::Origin => self.origin_hits.inc(),
        }
    }

    /// Count a failed resolve
    pub fn record_failure(&self, err: &ResolveError) {
        match err {
            ResolveError::OriginUnavailable { .. } => self.origin_unavailable.inc(),
            ResolveError::MalformedPayload { .. } => self.malformed_payloads.inc(),
            ResolveError::DurableUnavailable { .. } => self.durable_unavailable.inc(),
            ResolveError::CacheUnavailable { .. } => self.cache_unavailable.inc(),
        }
    }

    /// Total failed resolves across all kinds
    pub fn failures(&self) -> u64 {
        self.origin_unavailable.get()
            + self.malformed_payloads.get()
            + self.durable_unavailable.get()
            + self.cache_unavailable.get()
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OriginError;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        metrics.cmd_get.inc();
        metrics.active_connections.set(5);
        metrics.record_outcome(Outcome::Durable);

        let output = metrics.gather();
        assert!(output.contains("readthrough_cmd_get_total 1"));
        assert!(output.contains("readthrough_durable_hits_total 1"));
        assert!(output.contains("readthrough_active_connections 5"));
    }

    #[test]
    fn test_record_failure() {
        let metrics = Metrics::new();
        metrics.record_failure(&ResolveError::from_origin(1, OriginError::Timeout));
        metrics.record_failure(&ResolveError::from_origin(1, OriginError::Malformed("x".into())));

        assert_eq!(metrics.origin_unavailable.get(), 1);
        assert_eq!(metrics.malformed_payloads.get(), 1);
        assert_eq!(metrics.failures(), 2);
    }
}

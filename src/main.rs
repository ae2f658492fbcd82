//! readthrough - read-through post cache
//!
//! Serves posts over the memcached ASCII protocol, resolving each lookup
//! through a memcached cache, a durable store and an HTTP origin.

// Use jemalloc for better multi-threaded performance
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use readthrough::cache::MemcachedCache;
use readthrough::config::Config;
use readthrough::health::HealthServer;
use readthrough::metrics::Metrics;
use readthrough::origin::HttpOrigin;
use readthrough::resolver::Resolver;
use readthrough::server::Server;
use readthrough::storage;
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting readthrough");

    // Load configuration
    let config = if let Some(config_path) = std::env::args().nth(1) {
        info!("Loading configuration from {}", config_path);
        Config::from_file(&config_path)?
    } else {
        info!("Using default configuration (set READTHROUGH_* env vars to customize)");
        Config::from_env()?
    };

    info!("Configuration: {:?}", config);

    // Build tokio runtime with configured worker threads
    let mut runtime_builder = Builder::new_multi_thread();
    if config.server.worker_threads > 0 {
        runtime_builder.worker_threads(config.server.worker_threads);
        info!("Using {} worker threads", config.server.worker_threads);
    } else {
        info!("Using default worker threads (auto-detected)");
    }
    let runtime = runtime_builder.enable_all().build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Acquire tier handles
    info!("Connecting to cache at {}", config.cache.address);
    let cache = Arc::new(
        MemcachedCache::connect(&config.cache)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to cache: {e}"))?,
    );

    info!("Opening {:?} durable store", config.durable.backend);
    let durable = storage::open(&config.durable)
        .map_err(|e| anyhow::anyhow!("Failed to open durable store: {e}"))?;
    durable
        .provision()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to provision durable store: {e}"))?;

    let origin = Arc::new(HttpOrigin::new(&config.origin)?);

    // Initialize metrics and resolver
    let metrics = Arc::new(Metrics::new());
    let resolver = Arc::new(Resolver::with_metrics(
        cache,
        Arc::clone(&durable),
        origin,
        config.cache.ttl(),
        Arc::clone(&metrics),
    ));

    // Start health server if enabled
    let health_server = if config.metrics.enabled {
        let health = Arc::new(HealthServer::new(Arc::clone(&metrics)));
        let health_clone = Arc::clone(&health);
        let metrics_config = config.metrics.clone();
        let health_cancel = cancel_token.clone();

        tokio::spawn(async move {
            if let Err(e) = health_clone.run(&metrics_config, health_cancel).await {
                error!("Health server error: {}", e);
            }
        });

        Some(health)
    } else {
        None
    };

    // Create main server
    let server = Arc::new(Server::new(
        config.server.clone(),
        resolver,
        Arc::clone(&metrics),
        cancel_token.clone(),
    ));
    let listener = server.bind().await?;

    // Mark as ready once the listener is bound
    if let Some(ref health) = health_server {
        health.set_ready(true);
        info!("Server is ready");
    }

    // Setup signal handlers
    let cancel_for_signal = cancel_token.clone();
    let health_for_signal = health_server.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
            }
            () = terminate() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
        if let Some(health) = health_for_signal {
            health.set_ready(false);
        }
        cancel_for_signal.cancel();
    });

    // Run the main server
    if let Err(e) = server.serve(listener).await {
        error!("Server error: {}", e);
    }

    durable.close();
    info!("readthrough stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

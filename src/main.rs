//! Stockroom - items REST service with dependency-aware health reporting

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;
use stockroom::cache::CacheClient;
use stockroom::config::Config;
use stockroom::health::{CacheCheck, DependencyCheck, HealthAggregator};
use stockroom::items::{ItemService, ItemStore};
use stockroom::logging;
use stockroom::metrics::Metrics;
use stockroom::server::{AppState, Server, VERSION};
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    logging::init(&config.logging)?;
    let service_span = logging::service_span(&config.app);
    let _service = service_span.enter();

    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path),
        None => info!("Using environment configuration (set STOCKROOM_* env vars to customize)"),
    }

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
    let cancel_token = CancellationToken::new();

    let metrics = Arc::new(Metrics::new()?);
    let store = Arc::new(ItemStore::new());
    let cache = CacheClient::from_config(&config.cache);

    let mut health = HealthAggregator::new(config.health.probe_timeout());
    if cache.is_configured() {
        health = health.with_check(DependencyCheck::new(
            "cache",
            config.cache.required,
            CacheCheck::new(cache.clone()),
        ))?;
    }

    let items = Arc::new(ItemService::new(
        store,
        cache,
        Arc::clone(&metrics),
        config.cache.ttl(),
    ));

    let state = AppState {
        items,
        health: Arc::new(health),
        metrics,
        app: Arc::new(config.app.clone()),
    };

    info!(
        service = %config.app.name,
        version = VERSION,
        environment = config.app.environment.as_str(),
        "Starting Stockroom"
    );

    let server = Arc::new(Server::new(
        config.server.clone(),
        state,
        config.metrics.enabled,
        cancel_token.clone(),
    ));

    let cancel_for_signal = cancel_token.clone();
    let on_signal = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
            }
            _ = terminate() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
        cancel_for_signal.cancel();
    };
    tokio::spawn(on_signal.in_current_span());

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("Stockroom stopped");
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

// Start command implementation
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::config::SiloqConfig;
use crate::core::cleanup::CleanupManager;
use crate::engine::Engine;
use crate::server::metrics::start_metrics_server;
use crate::server::shutdown::{shutdown_on_signal, ShutdownSignal};

/// Grace period granted to background tasks after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Execute the start command: run the engine until SIGINT or SIGTERM.
pub async fn execute(config: SiloqConfig) -> Result<()> {
    info!("Starting siloq");
    info!(
        account_id = %config.engine.account_id,
        region = %config.engine.region,
        base_url = %config.engine.base_url,
        "Engine configuration loaded"
    );

    let engine = Engine::new(config.engine.clone());
    let shutdown = ShutdownSignal::new();

    let cleanup_manager = Arc::new(CleanupManager::new(engine.clone()));
    let cleanup_handle = tokio::spawn(cleanup_manager.start(shutdown.subscribe()));
    info!("Cleanup manager started");

    let metrics_handle = if config.metrics.enabled {
        let metrics_engine = engine.clone();
        let bind_address = config.metrics.bind_address.clone();
        let port = config.metrics.port;
        let shutdown_rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = start_metrics_server(metrics_engine, bind_address, port, shutdown_rx).await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        info!("Metrics server disabled");
        None
    };

    shutdown_on_signal(shutdown, SHUTDOWN_GRACE).await;

    cleanup_handle.abort();
    if let Some(handle) = metrics_handle {
        handle.abort();
    }
    Ok(())
}

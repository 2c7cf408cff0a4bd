//! Process signals and the broadcast that stops background tasks.

use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Fan-out stop notification for the sweeper and the metrics server.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Signal with no subscribers yet.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Receiver that yields once shutdown is triggered.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Notify every subscriber. Returns how many were listening.
    pub fn shutdown(&self) -> usize {
        self.sender.send(()).unwrap_or(0)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve with the name of the first termination signal received.
///
/// A handler that cannot be installed never resolves, so the other one still works.
pub async fn wait_for_signal() -> &'static str {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGINT");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}

/// Block until a termination signal, stop subscribers, then wait `grace`.
pub async fn shutdown_on_signal(shutdown_signal: ShutdownSignal, grace: Duration) {
    let name = wait_for_signal().await;
    let listeners = shutdown_signal.shutdown();
    info!(signal = name, listeners, "Shutting down");

    tokio::time::sleep(grace).await;
    info!("Shutdown complete");
}

/// Future for axum's graceful shutdown hook.
pub async fn shutdown_receiver(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

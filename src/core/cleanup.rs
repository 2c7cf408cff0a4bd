//! Background sweep task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info};

use crate::engine::Engine;

/// Periodically fires due timers on every queue, so idle queues still return
/// expired deliveries, release delayed messages and drop retained-out ones.
pub struct CleanupManager {
    engine: Engine,
    check_interval: Duration,
}

impl CleanupManager {
    /// Create a cleanup manager using the engine's configured sweep interval.
    pub fn new(engine: Engine) -> Self {
        let interval = Duration::from_secs(engine.config().sweep_interval_secs);
        Self::with_interval(engine, interval)
    }

    /// Create a cleanup manager with custom check interval.
    pub fn with_interval(engine: Engine, check_interval: Duration) -> Self {
        Self {
            engine,
            check_interval,
        }
    }

    /// Run until a shutdown signal arrives.
    pub async fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            "Starting cleanup manager"
        );

        let mut interval = time::interval(self.check_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.engine.sweep().await;
                    debug!(
                        queues = report.queues,
                        returned = report.returned,
                        released = report.released,
                        expired = report.expired,
                        pruned = report.pruned,
                        "Sweep completed"
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("Cleanup manager stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::QueueService;
    use crate::types::{ReceiveOptions, SendMessageInput};
    use std::collections::HashMap;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_returns_expired_deliveries() {
        let engine = Engine::new(EngineConfig::default());
        let url = engine.create_queue("sweep", HashMap::new()).await.unwrap();
        engine
            .send_message(&url, SendMessageInput::new("hello"))
            .await
            .unwrap();

        let mut options = ReceiveOptions::max(1);
        options.visibility_timeout = Some(5);
        assert_eq!(engine.receive_message(&url, options).await.unwrap().len(), 1);

        time::advance(Duration::from_secs(5)).await;
        let report = engine.sweep().await;
        assert_eq!(report.queues, 1);
        assert_eq!(report.returned, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_stops_on_shutdown() {
        let engine = Engine::new(EngineConfig::default());
        let manager = Arc::new(CleanupManager::with_interval(engine, Duration::from_secs(1)));
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(manager.start(rx));
        time::advance(Duration::from_secs(3)).await;
        tx.send(()).unwrap();
        task.await.unwrap();
    }
}

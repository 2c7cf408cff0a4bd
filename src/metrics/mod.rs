//! Metrics and monitoring using Prometheus.
//!
//! Metrics are exposed on the `/metrics` endpoint and include:
//!
//! - **Counters**: messages sent, received, deleted, expired and moved to a dead-letter queue
//! - **Histograms**: action latency
//! - **Gauges**: queue depth, in-flight messages, queue count

use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use tracing::error;

/// Global metrics registry
static METRICS_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Global metrics instance
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    let metrics = Metrics::new();
    if let Err(e) = metrics.register(&METRICS_REGISTRY) {
        error!("Failed to register metrics: {}", e);
    }
    Arc::new(metrics)
});

/// Metrics collector for siloq
pub struct Metrics {
    /// Total messages accepted by send (counter)
    pub messages_sent_total: IntCounterVec,
    /// Total messages delivered by receive (counter)
    pub messages_received_total: IntCounterVec,
    /// Total messages deleted through a receipt handle (counter)
    pub messages_deleted_total: IntCounterVec,
    /// Total messages moved to dead-letter queues (counter)
    pub messages_to_dlq_total: IntCounterVec,
    /// Total messages dropped by the retention period (counter)
    pub messages_expired_total: IntCounterVec,
    /// Total actions dispatched, by outcome (counter)
    pub actions_total: IntCounterVec,

    /// Action latency in seconds (histogram)
    pub action_latency_seconds: HistogramVec,

    /// Current number of visible messages (gauge)
    pub queue_depth: IntGaugeVec,
    /// Current number of in-flight messages (gauge)
    pub in_flight_messages: IntGaugeVec,
    /// Current number of delayed messages (gauge)
    pub delayed_messages: IntGaugeVec,
    /// Total number of queues (gauge)
    pub queue_count: IntGauge,
}

const PREFIX: &str = "siloq";

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help).namespace(PREFIX), labels)
        .unwrap_or_else(|e| panic!("invalid counter {}: {}", name, e))
}

fn gauge_vec(name: &str, help: &str) -> IntGaugeVec {
    IntGaugeVec::new(Opts::new(name, help).namespace(PREFIX), &["queue"])
        .unwrap_or_else(|e| panic!("invalid gauge {}: {}", name, e))
}

impl Metrics {
    /// Create a new, unregistered Metrics instance
    pub fn new() -> Self {
        let queue = &["queue"];
        Self {
            messages_sent_total: counter_vec(
                "messages_sent_total",
                "Total messages sent to queues",
                queue,
            ),
            messages_received_total: counter_vec(
                "messages_received_total",
                "Total messages delivered by receive",
                queue,
            ),
            messages_deleted_total: counter_vec(
                "messages_deleted_total",
                "Total messages deleted through a receipt handle",
                queue,
            ),
            messages_to_dlq_total: counter_vec(
                "messages_to_dlq_total",
                "Total messages moved to a dead-letter queue, by source queue",
                queue,
            ),
            messages_expired_total: counter_vec(
                "messages_expired_total",
                "Total messages removed by the retention period",
                queue,
            ),
            actions_total: counter_vec(
                "actions_total",
                "Total actions dispatched, by outcome",
                &["action", "status"],
            ),
            action_latency_seconds: HistogramVec::new(
                HistogramOpts::new("action_latency_seconds", "Action latency in seconds")
                    .namespace(PREFIX)
                    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 20.0]),
                &["action"],
            )
            .unwrap_or_else(|e| panic!("invalid histogram action_latency_seconds: {}", e)),
            queue_depth: gauge_vec("queue_depth", "Visible messages per queue"),
            in_flight_messages: gauge_vec("in_flight_messages", "In-flight messages per queue"),
            delayed_messages: gauge_vec("delayed_messages", "Delayed messages per queue"),
            queue_count: IntGauge::with_opts(
                Opts::new("queue_count", "Number of live queues").namespace(PREFIX),
            )
            .unwrap_or_else(|e| panic!("invalid gauge queue_count: {}", e)),
        }
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.messages_sent_total.clone()),
            Box::new(self.messages_received_total.clone()),
            Box::new(self.messages_deleted_total.clone()),
            Box::new(self.messages_to_dlq_total.clone()),
            Box::new(self.messages_expired_total.clone()),
            Box::new(self.actions_total.clone()),
            Box::new(self.action_latency_seconds.clone()),
            Box::new(self.queue_depth.clone()),
            Box::new(self.in_flight_messages.clone()),
            Box::new(self.delayed_messages.clone()),
            Box::new(self.queue_count.clone()),
        ]
    }

    /// Register every collector with `registry`.
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        self.collectors()
            .into_iter()
            .try_for_each(|collector| registry.register(collector))
    }

    /// Drop the per-queue series of a deleted queue.
    pub fn forget_queue(&self, queue: &str) {
        let _ = self.queue_depth.remove_label_values(&[queue]);
        let _ = self.in_flight_messages.remove_label_values(&[queue]);
        let _ = self.delayed_messages.remove_label_values(&[queue]);
    }

    /// Gather metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = METRICS_REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the global metrics instance
pub fn get_metrics() -> Arc<Metrics> {
    METRICS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_metrics_lazy_initialization() {
        let metrics1 = get_metrics();
        let metrics2 = get_metrics();
        assert!(Arc::ptr_eq(&metrics1, &metrics2));
    }

    #[test]
    fn test_gather_contains_prefix() {
        let metrics = get_metrics();
        metrics
            .messages_sent_total
            .with_label_values(&["metrics-test"])
            .inc();
        metrics.queue_depth.with_label_values(&["metrics-test"]).set(3);

        let output = metrics.gather().expect("Failed to gather metrics");
        assert!(output.contains("siloq_messages_sent_total"));
        assert!(output.contains("siloq_queue_depth"));
    }

    #[test]
    fn test_register_into_private_registry() {
        let registry = Registry::new();
        let metrics = Metrics::new();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());

        metrics.queue_count.set(4);
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|family| family.get_name() == "siloq_queue_count"));
    }

    #[test]
    fn test_forget_queue_removes_gauges() {
        let metrics = get_metrics();
        metrics
            .in_flight_messages
            .with_label_values(&["forget-me"])
            .set(1);
        metrics.forget_queue("forget-me");

        let output = metrics.gather().expect("Failed to gather metrics");
        assert!(!output.contains("forget-me"));
    }
}

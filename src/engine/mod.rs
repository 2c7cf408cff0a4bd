//! The queue engine.
//!
//! [`Engine`] is a cheap, cloneable handle over the registry and configuration.
//! Every message operation resolves its queue, takes that queue's lock, fires
//! the queue's due timers for the current instant and only then acts, so timer
//! expiry and client operations on one queue are totally ordered.

mod receive;
mod service;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

pub use service::QueueService;

use crate::config::EngineConfig;
use crate::core::batch::{
    validate_entries, validate_send_batch_size, BatchOutput, ChangeMessageVisibilityBatchEntry,
    DeleteMessageBatchEntry, SendMessageBatchEntry,
};
use crate::core::clock::Clock;
use crate::core::receipt::parse_receipt_handle;
use crate::metrics;
use crate::registry::{QueueHandle, QueueRegistry};
use crate::types::attributes::QueueAttributeName;
use crate::types::policy::PermissionAction;
use crate::types::validation::{validate_range, MAX_VISIBILITY_TIMEOUT};
use crate::types::{
    QueueStats, ReceiveOptions, ReceivedMessage, SendMessageInput, SendMessageOutput,
};
use crate::{Error, Result};

struct EngineInner {
    config: EngineConfig,
    clock: Clock,
    registry: QueueRegistry,
}

/// In-process queue engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// What one [`Engine::sweep`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Queues visited.
    pub queues: usize,
    /// Messages returned from in-flight.
    pub returned: usize,
    /// Delayed messages released.
    pub released: usize,
    /// Messages removed by retention.
    pub expired: usize,
    /// Deleted queue names whose grace period ended.
    pub pruned: usize,
}

impl Engine {
    /// Engine with no queues.
    pub fn new(config: EngineConfig) -> Self {
        let clock = Clock::new();
        let registry = QueueRegistry::new(&config, clock);
        Self {
            inner: Arc::new(EngineInner {
                config,
                clock,
                registry,
            }),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Engine clock.
    pub fn clock(&self) -> Clock {
        self.inner.clock
    }

    /// Queue registry.
    pub fn registry(&self) -> &QueueRegistry {
        &self.inner.registry
    }

    /// Fire due timers on every queue, wake long polls that can now make
    /// progress, refresh gauges and drop expired deletion records.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for handle in self.registry().all_queues().await {
            let mut state = handle.lock().await;
            let advance = state.advance(self.clock().now());
            // delete_queue forgets the series only after taking this lock
            publish_gauges(&handle, &state.store.stats());
            drop(state);

            if advance.made_visible() {
                handle.notify().notify_waiters();
            }
            report.queues += 1;
            report.returned += advance.returned;
            report.released += advance.released;
            report.expired += advance.expired;
        }

        report.pruned = self.registry().prune_deleted().await;
        report
    }

    async fn send(&self, handle: &QueueHandle, input: SendMessageInput) -> Result<SendMessageOutput> {
        let now = self.clock().now();
        let output = {
            let mut guard = handle.lock().await;
            guard.advance(now);
            let state = &mut *guard;
            state.store.enqueue(
                input,
                &state.attributes,
                &self.config().account_id,
                now,
                self.clock().wall(now),
            )?
        };

        handle.notify().notify_waiters();
        metrics::get_metrics()
            .messages_sent_total
            .with_label_values(&[handle.name()])
            .inc();
        Ok(output)
    }

    async fn delete(&self, handle: &QueueHandle, receipt_handle: &str) -> Result<()> {
        let data = parse_receipt_handle(receipt_handle)?;
        if data.queue != handle.name() {
            return Err(Error::ReceiptHandleIsInvalid);
        }

        let mut state = handle.lock().await;
        state.advance(self.clock().now());
        state.store.delete(&data)?;
        drop(state);

        metrics::get_metrics()
            .messages_deleted_total
            .with_label_values(&[handle.name()])
            .inc();
        Ok(())
    }

    async fn change_visibility(
        &self,
        handle: &QueueHandle,
        receipt_handle: &str,
        visibility_timeout: u32,
    ) -> Result<()> {
        validate_range("VisibilityTimeout", visibility_timeout, 0, MAX_VISIBILITY_TIMEOUT)?;
        let data = parse_receipt_handle(receipt_handle)?;
        if data.queue != handle.name() {
            return Err(Error::ReceiptHandleIsInvalid);
        }

        let now = self.clock().now();
        let mut state = handle.lock().await;
        state.advance(now);
        state
            .store
            .change_visibility(&data, visibility_timeout, now)?;
        state.advance(now);
        drop(state);

        handle.notify().notify_waiters();
        Ok(())
    }
}

/// Refresh the per-queue gauges. Call with the queue lock held.
fn publish_gauges(handle: &QueueHandle, stats: &QueueStats) {
    if handle.is_deleted() {
        return;
    }
    let metrics = metrics::get_metrics();
    metrics
        .queue_depth
        .with_label_values(&[handle.name()])
        .set(stats.visible as i64);
    metrics
        .in_flight_messages
        .with_label_values(&[handle.name()])
        .set(stats.in_flight as i64);
    metrics
        .delayed_messages
        .with_label_values(&[handle.name()])
        .set(stats.delayed as i64);
}

#[async_trait]
impl QueueService for Engine {
    async fn add_permission(
        &self,
        queue_url: &str,
        label: &str,
        account_ids: Vec<String>,
        actions: Vec<PermissionAction>,
    ) -> Result<()> {
        self.registry()
            .add_permission(queue_url, label, &account_ids, &actions)
            .await
    }

    async fn remove_permission(&self, queue_url: &str, label: &str) -> Result<()> {
        self.registry().remove_permission(queue_url, label).await
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String> {
        let handle = self.registry().create_queue(name, &attributes).await?;
        Ok(handle.url().to_string())
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<()> {
        self.registry().delete_queue(queue_url).await
    }

    async fn get_queue_url(&self, name: &str) -> Result<String> {
        self.registry().get_queue_url(name).await
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: Vec<String>,
    ) -> Result<BTreeMap<QueueAttributeName, String>> {
        self.registry()
            .get_queue_attributes(queue_url, &attribute_names)
            .await
    }

    async fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: HashMap<String, String>,
    ) -> Result<()> {
        self.registry()
            .set_queue_attributes(queue_url, &attributes)
            .await
    }

    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        Ok(self.registry().list_queues(prefix).await)
    }

    async fn list_dead_letter_source_queues(&self, queue_url: &str) -> Result<Vec<String>> {
        self.registry()
            .list_dead_letter_source_queues(queue_url)
            .await
    }

    async fn purge_queue(&self, queue_url: &str) -> Result<()> {
        let handle = self.registry().get_by_url(queue_url).await?;
        let now = self.clock().now();
        let cooldown = Duration::from_secs(self.config().purge_cooldown_secs);

        let mut state = handle.lock().await;
        state.advance(now);
        if let Some(last) = state.last_purge {
            if now < last + cooldown {
                return Err(Error::PurgeQueueInProgress(handle.name().to_string()));
            }
        }
        let purged = state.store.purge();
        state.last_purge = Some(now);

        info!(queue_name = %handle.name(), purged, "Queue purged");
        Ok(())
    }

    async fn send_message(
        &self,
        queue_url: &str,
        input: SendMessageInput,
    ) -> Result<SendMessageOutput> {
        let handle = self.registry().get_by_url(queue_url).await?;
        self.send(&handle, input).await
    }

    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<SendMessageBatchEntry>,
    ) -> Result<BatchOutput<SendMessageOutput>> {
        validate_entries(&entries)?;
        validate_send_batch_size(&entries)?;
        let handle = self.registry().get_by_url(queue_url).await?;

        let mut output = BatchOutput::default();
        for entry in entries {
            let outcome = self.send(&handle, entry.input).await;
            output.record(&entry.id, outcome);
        }

        debug!(
            queue_name = %handle.name(),
            successful = output.successful.len(),
            failed = output.failed.len(),
            "Send batch processed"
        );
        Ok(output)
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>> {
        let handle = self.registry().get_by_url(queue_url).await?;
        self.receive(handle, options).await
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        let handle = self.registry().get_by_url(queue_url).await?;
        self.delete(&handle, receipt_handle).await
    }

    async fn delete_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteMessageBatchEntry>,
    ) -> Result<BatchOutput<()>> {
        validate_entries(&entries)?;
        let handle = self.registry().get_by_url(queue_url).await?;

        let mut output = BatchOutput::default();
        for entry in &entries {
            let outcome = self.delete(&handle, &entry.receipt_handle).await;
            output.record(&entry.id, outcome);
        }

        debug!(
            queue_name = %handle.name(),
            successful = output.successful.len(),
            failed = output.failed.len(),
            "Delete batch processed"
        );
        Ok(output)
    }

    async fn change_message_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        visibility_timeout: u32,
    ) -> Result<()> {
        let handle = self.registry().get_by_url(queue_url).await?;
        self.change_visibility(&handle, receipt_handle, visibility_timeout)
            .await
    }

    async fn change_message_visibility_batch(
        &self,
        queue_url: &str,
        entries: Vec<ChangeMessageVisibilityBatchEntry>,
    ) -> Result<BatchOutput<()>> {
        validate_entries(&entries)?;
        let handle = self.registry().get_by_url(queue_url).await?;

        let mut output = BatchOutput::default();
        for entry in &entries {
            let outcome = self
                .change_visibility(&handle, &entry.receipt_handle, entry.visibility_timeout)
                .await;
            output.record(&entry.id, outcome);
        }

        debug!(
            queue_name = %handle.name(),
            successful = output.successful.len(),
            failed = output.failed.len(),
            "Change visibility batch processed"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gauges_not_republished_after_delete() {
        let engine = Engine::new(EngineConfig::default());
        let url = engine
            .create_queue("gauge-after-delete", HashMap::new())
            .await
            .unwrap();
        let handle = engine.registry().get_by_url(&url).await.unwrap();
        let stats = handle.lock().await.store.stats();

        publish_gauges(&handle, &stats);
        let output = metrics::get_metrics().gather().unwrap();
        assert!(output.contains("gauge-after-delete"));

        engine.delete_queue(&url).await.unwrap();
        let state = handle.lock().await;
        publish_gauges(&handle, &state.store.stats());
        drop(state);

        let output = metrics::get_metrics().gather().unwrap();
        assert!(!output.contains("gauge-after-delete"));
    }
}

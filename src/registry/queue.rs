//! A live queue: identity, attributes and its message store behind one lock.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::Instant;

use crate::metrics;
use crate::storage::memory::Advance;
use crate::storage::MessageStore;
use crate::types::attributes::QueueAttributes;

/// Mutable queue state, guarded by the queue lock.
#[derive(Debug)]
pub struct QueueState {
    /// Current attributes.
    pub attributes: QueueAttributes,
    /// Last attribute change.
    pub last_modified: DateTime<Utc>,
    /// Messages.
    pub store: MessageStore,
    /// Instant of the last purge.
    pub last_purge: Option<Instant>,
}

impl QueueState {
    /// Fire the store's due timers and record what happened.
    pub fn advance(&mut self, now: Instant) -> Advance {
        let report = self.store.advance(now);
        if report.expired > 0 {
            metrics::get_metrics()
                .messages_expired_total
                .with_label_values(&[self.store.queue_name()])
                .inc_by(report.expired as u64);
        }
        report
    }
}

/// A queue known to the registry.
#[derive(Debug)]
pub struct QueueHandle {
    id: u64,
    name: String,
    url: String,
    arn: String,
    created_at: DateTime<Utc>,
    state: Mutex<QueueState>,
    notify: Notify,
    deleted: AtomicBool,
}

impl QueueHandle {
    /// New queue with an empty store.
    pub fn new(
        id: u64,
        name: String,
        url: String,
        arn: String,
        attributes: QueueAttributes,
        created_at: DateTime<Utc>,
    ) -> Self {
        let store = MessageStore::new(name.clone());
        Self {
            id,
            name,
            url,
            arn,
            created_at,
            state: Mutex::new(QueueState {
                attributes,
                last_modified: created_at,
                store,
                last_purge: None,
            }),
            notify: Notify::new(),
            deleted: AtomicBool::new(false),
        }
    }

    /// Creation sequence number; the global lock order.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Queue ARN.
    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Acquire the queue lock.
    pub async fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().await
    }

    /// The queue lock itself, for ordered multi-queue locking.
    pub fn state(&self) -> &Mutex<QueueState> {
        &self.state
    }

    /// Waiters for new visible messages.
    pub fn notify(&self) -> &Notify {
        &self.notify
    }

    /// Whether the queue has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Mark deleted and wake every long poll so it returns.
    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

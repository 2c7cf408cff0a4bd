//! Dead-letter redrive.
//!
//! A receive on a queue with a redrive policy builds a [`DeadLetterRouter`]
//! over the dead-letter queue's store while holding both queue locks. Locks
//! are always taken in queue creation order via [`lock_in_order`] so two
//! queues redriving into each other cannot deadlock.

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::metrics;
use crate::storage::{MessageRecord, MessageStore};
use crate::types::attributes::RedrivePolicy;

/// Moves over-received messages into a dead-letter queue's store.
pub struct DeadLetterRouter<'a> {
    source_queue: &'a str,
    max_receive_count: u32,
    target: &'a mut MessageStore,
    retention_period: u32,
    moved: usize,
}

impl<'a> DeadLetterRouter<'a> {
    /// Router for `source_queue` into `target`, whose retention applies to moved messages.
    pub fn new(
        source_queue: &'a str,
        policy: &RedrivePolicy,
        target: &'a mut MessageStore,
        retention_period: u32,
    ) -> Self {
        Self {
            source_queue,
            max_receive_count: policy.max_receive_count,
            target,
            retention_period,
            moved: 0,
        }
    }

    /// Whether a message at `receive_count` must be redriven instead of delivered.
    pub fn should_redrive(&self, receive_count: u32) -> bool {
        should_redrive(receive_count, self.max_receive_count)
    }

    /// Move `record` into the dead-letter queue.
    pub fn route(&mut self, record: MessageRecord) {
        info!(
            source_queue = %self.source_queue,
            dead_letter_queue = %self.target.queue_name(),
            message_id = %record.id,
            receive_count = record.receive_count,
            max_receive_count = self.max_receive_count,
            "Moving message to dead-letter queue"
        );
        metrics::get_metrics()
            .messages_to_dlq_total
            .with_label_values(&[self.source_queue])
            .inc();
        self.target.accept_redriven(record, self.retention_period);
        self.moved += 1;
    }

    /// Messages moved so far.
    pub fn moved(&self) -> usize {
        self.moved
    }
}

/// A delivery attempt that would bring the count above `max_receive_count` is redriven.
pub fn should_redrive(receive_count: u32, max_receive_count: u32) -> bool {
    receive_count > max_receive_count
}

/// Lock two distinct mutexes ordered by `(order_key, mutex)` pairs.
///
/// Returns the guards in argument order.
pub async fn lock_in_order<'a, T>(
    first: (u64, &'a Mutex<T>),
    second: (u64, &'a Mutex<T>),
) -> (MutexGuard<'a, T>, MutexGuard<'a, T>) {
    if first.0 <= second.0 {
        let a = first.1.lock().await;
        let b = second.1.lock().await;
        (a, b)
    } else {
        let b = second.1.lock().await;
        let a = first.1.lock().await;
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::DeliveryRequest;
    use crate::types::attributes::QueueAttributes;
    use crate::types::SendMessageInput;
    use chrono::Utc;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy(max_receive_count: u32) -> RedrivePolicy {
        RedrivePolicy {
            dead_letter_target_arn: "arn:aws:sqs:us-east-1:000000000000:dlq".to_string(),
            max_receive_count,
        }
    }

    #[test]
    fn test_should_redrive_threshold() {
        assert!(!should_redrive(1, 1));
        assert!(should_redrive(2, 1));
        assert!(!should_redrive(3, 3));
        assert!(should_redrive(4, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_moves_on_receive() {
        let attributes = QueueAttributes::default();
        let mut source = MessageStore::new("work");
        let mut dlq = MessageStore::new("dlq");
        let now = Instant::now();
        let sent = source
            .enqueue(SendMessageInput::new("poison"), &attributes, "acct", now, Utc::now())
            .unwrap();

        let request = DeliveryRequest {
            max_messages: 1,
            visibility_timeout: 0,
            attribute_names: &[],
            message_attribute_names: &[],
        };
        let redrive = policy(1);

        let mut router = DeadLetterRouter::new("work", &redrive, &mut dlq, 345_600);
        let first = source.receive(&request, now, Utc::now(), Some(&mut router));
        assert_eq!(first.messages.len(), 1);
        assert_eq!(router.moved(), 0);

        source.advance(now);
        let second = source.receive(&request, now, Utc::now(), Some(&mut router));
        assert!(second.messages.is_empty());
        assert_eq!(second.redriven, vec![sent.message_id.clone()]);
        assert_eq!(router.moved(), 1);

        assert!(source.is_empty());
        let moved = dlq.receive(&request, now, Utc::now(), None);
        assert_eq!(moved.messages[0].message_id, sent.message_id);
        assert_eq!(moved.messages[0].body, "poison");
    }

    #[tokio::test]
    async fn test_lock_in_order_returns_argument_order() {
        let a = Arc::new(Mutex::new("a"));
        let b = Arc::new(Mutex::new("b"));

        let (ga, gb) = lock_in_order((2, &*a), (1, &*b)).await;
        assert_eq!(*ga, "a");
        assert_eq!(*gb, "b");
    }
}

//! Receive path: one locked pass over the store, wrapped in a long-poll loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::dlq::{lock_in_order, DeadLetterRouter};
use crate::metrics;
use crate::registry::{QueueHandle, QueueState};
use crate::storage::memory::{DeliveryRequest, ReceiveOutcome};
use crate::types::validation::{
    validate_range, MAX_RECEIVE_MESSAGES, MAX_VISIBILITY_TIMEOUT, MAX_WAIT_TIME_SECONDS,
};
use crate::types::{MessageSystemAttributeName, ReceiveOptions, ReceivedMessage};
use crate::{Error, Result};

use super::Engine;

/// Receive options after validation and expansion.
struct ResolvedReceive {
    max_messages: usize,
    visibility_timeout: Option<u32>,
    attribute_names: Vec<MessageSystemAttributeName>,
    message_attribute_names: Vec<String>,
}

impl Engine {
    pub(super) async fn receive(
        &self,
        handle: Arc<QueueHandle>,
        options: ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>> {
        validate_range("MaxNumberOfMessages", options.max_messages, 1, MAX_RECEIVE_MESSAGES)?;
        if let Some(timeout) = options.visibility_timeout {
            validate_range("VisibilityTimeout", timeout, 0, MAX_VISIBILITY_TIMEOUT)?;
        }
        if let Some(wait) = options.wait_time_seconds {
            validate_range("WaitTimeSeconds", wait, 0, MAX_WAIT_TIME_SECONDS)?;
        }

        let resolved = ResolvedReceive {
            max_messages: options.max_messages as usize,
            visibility_timeout: options.visibility_timeout,
            attribute_names: MessageSystemAttributeName::expand(&options.attribute_names),
            message_attribute_names: options.message_attribute_names,
        };

        let wait = match options.wait_time_seconds {
            Some(wait) => wait,
            None => handle.lock().await.attributes.receive_message_wait_time_seconds,
        };
        let deadline = self.clock().now() + Duration::from_secs(u64::from(wait));

        loop {
            let notified = handle.notify().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (messages, next_timer) = self.receive_once(&handle, &resolved).await?;
            if !messages.is_empty() || handle.is_deleted() {
                return Ok(messages);
            }

            let now = self.clock().now();
            if now >= deadline {
                return Ok(messages);
            }

            let wake_at = next_timer.map_or(deadline, |timer| timer.min(deadline));
            debug!(
                queue_name = %handle.name(),
                remaining_ms = (deadline - now).as_millis() as u64,
                "Long poll waiting"
            );
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    /// One locked pass. Returns the delivered messages and the queue's next timer.
    async fn receive_once(
        &self,
        handle: &Arc<QueueHandle>,
        resolved: &ResolvedReceive,
    ) -> Result<(Vec<ReceivedMessage>, Option<Instant>)> {
        let dlq = self.dead_letter_queue(handle).await;

        match dlq {
            Some(dlq) => {
                let (mut source, mut target) =
                    lock_in_order((handle.id(), handle.state()), (dlq.id(), dlq.state())).await;
                let now = self.clock().now();
                source.advance(now);
                target.advance(now);

                let policy = source
                    .attributes
                    .redrive_policy
                    .clone()
                    .filter(|p| p.dead_letter_target_arn == dlq.arn() && !dlq.is_deleted());
                let retention = target.attributes.message_retention_period;

                let outcome = match &policy {
                    Some(policy) => {
                        let mut router =
                            DeadLetterRouter::new(handle.name(), policy, &mut target.store, retention);
                        self.deliver(&mut source, resolved, now, Some(&mut router))?
                    }
                    None => self.deliver(&mut source, resolved, now, None)?,
                };

                if !outcome.redriven.is_empty() {
                    dlq.notify().notify_waiters();
                }
                Ok((outcome.messages, source.store.next_deadline()))
            }
            None => {
                let mut state = handle.lock().await;
                let now = self.clock().now();
                state.advance(now);
                let outcome = self.deliver(&mut state, resolved, now, None)?;
                Ok((outcome.messages, state.store.next_deadline()))
            }
        }
    }

    /// The live dead-letter queue of `handle`, if its redrive policy names one.
    async fn dead_letter_queue(&self, handle: &Arc<QueueHandle>) -> Option<Arc<QueueHandle>> {
        let policy = handle.lock().await.attributes.redrive_policy.clone()?;
        let dlq = self.registry().get_by_name(policy.target_queue_name()).await;
        match dlq {
            Some(dlq) if dlq.arn() == policy.dead_letter_target_arn && !Arc::ptr_eq(&dlq, handle) => {
                Some(dlq)
            }
            _ => {
                warn!(
                    queue_name = %handle.name(),
                    dead_letter_target_arn = %policy.dead_letter_target_arn,
                    "Dead-letter queue is gone, delivering normally"
                );
                None
            }
        }
    }

    fn deliver(
        &self,
        state: &mut QueueState,
        resolved: &ResolvedReceive,
        now: Instant,
        router: Option<&mut DeadLetterRouter<'_>>,
    ) -> Result<ReceiveOutcome> {
        let cap = self.config().max_inflight_per_queue;
        let in_flight = state.store.in_flight_count();
        if in_flight >= cap {
            return Err(Error::OverLimit(format!(
                "Queue {} has reached the maximum of {} in-flight messages",
                state.store.queue_name(),
                cap
            )));
        }

        let request = DeliveryRequest {
            max_messages: resolved.max_messages.min(cap - in_flight),
            visibility_timeout: resolved
                .visibility_timeout
                .unwrap_or(state.attributes.visibility_timeout),
            attribute_names: &resolved.attribute_names,
            message_attribute_names: &resolved.message_attribute_names,
        };
        let outcome = state
            .store
            .receive(&request, now, self.clock().wall(now), router);

        if !outcome.messages.is_empty() {
            metrics::get_metrics()
                .messages_received_total
                .with_label_values(&[state.store.queue_name()])
                .inc_by(outcome.messages.len() as u64);
        }
        Ok(outcome)
    }
}

//! In-memory message store for a single queue.
//!
//! The store is an arena of [`MessageRecord`]s keyed by [`MessageKey`], with a
//! visible set ordered by arrival, a lifecycle timer wheel (delay release and
//! retention) and a [`VisibilityManager`] for in-flight deliveries. Every
//! method expects the caller to hold the owning queue's lock and to have called
//! [`MessageStore::advance`] for the operation's instant first.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use crate::core::dlq::DeadLetterRouter;
use crate::core::receipt::{generate_receipt_handle, ReceiptHandleData};
use crate::core::timer::TimerWheel;
use crate::core::visibility::{HandleStatus, VisibilityManager};
use crate::storage::{MessageKey, MessageRecord, MessageState};
use crate::types::attributes::QueueAttributes;
use crate::types::digest::{md5_of_attributes, md5_of_body};
use crate::types::validation::{
    validate_message_size, validate_send_input, MAX_VISIBILITY_TIMEOUT,
};
use crate::types::{
    MessageAttributes, MessageId, MessageSystemAttributeName, QueueStats, ReceivedMessage,
    SendMessageInput, SendMessageOutput,
};
use crate::{Error, Result};

/// Lifecycle timers other than visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum LifecycleTimer {
    /// Delay elapsed: Delayed -> Visible.
    Release,
    /// Retention elapsed: remove in any state.
    Retention,
}

/// What a single [`MessageStore::advance`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// In-flight messages whose visibility timeout fired.
    pub returned: usize,
    /// Delayed messages that became visible.
    pub released: usize,
    /// Messages removed by retention.
    pub expired: usize,
}

impl Advance {
    /// Whether any message became visible.
    pub fn made_visible(&self) -> bool {
        self.returned + self.released > 0
    }
}

/// Parameters of one receive against a store.
#[derive(Debug, Clone)]
pub struct DeliveryRequest<'a> {
    /// Upper bound on delivered messages.
    pub max_messages: usize,
    /// Effective visibility timeout in seconds.
    pub visibility_timeout: u32,
    /// System attributes to return.
    pub attribute_names: &'a [MessageSystemAttributeName],
    /// Message attribute name filters.
    pub message_attribute_names: &'a [String],
}

/// Result of [`MessageStore::receive`].
#[derive(Debug, Default)]
pub struct ReceiveOutcome {
    /// Delivered messages.
    pub messages: Vec<ReceivedMessage>,
    /// Messages moved to the dead-letter queue instead of being delivered.
    pub redriven: Vec<MessageId>,
}

/// Message store for one queue.
#[derive(Debug)]
pub struct MessageStore {
    queue_name: String,
    next_key: u64,
    next_epoch: u64,
    records: HashMap<MessageKey, MessageRecord>,
    index: HashMap<MessageId, MessageKey>,
    visible: BTreeSet<MessageKey>,
    timers: TimerWheel<(LifecycleTimer, MessageKey)>,
    visibility: VisibilityManager,
}

impl MessageStore {
    /// Empty store for `queue_name`.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            next_key: 0,
            next_epoch: 0,
            records: HashMap::new(),
            index: HashMap::new(),
            visible: BTreeSet::new(),
            timers: TimerWheel::new(),
            visibility: VisibilityManager::new(),
        }
    }

    /// Queue this store belongs to.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Validate and store a new message.
    pub fn enqueue(
        &mut self,
        input: SendMessageInput,
        attributes: &QueueAttributes,
        sender_id: &str,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Result<SendMessageOutput> {
        validate_send_input(&input)?;
        validate_message_size(input.payload_size(), attributes.maximum_message_size)?;

        let delay = input.delay_seconds.unwrap_or(attributes.delay_seconds);
        let md5_of_body = md5_of_body(&input.body);
        let md5_of_attributes = md5_of_attributes(&input.attributes);
        let message_id = MessageId::new();

        let record = MessageRecord {
            id: message_id.clone(),
            body: input.body,
            attributes: input.attributes,
            md5_of_body: md5_of_body.clone(),
            md5_of_attributes: md5_of_attributes.clone(),
            sender_id: sender_id.to_string(),
            sent_at: now,
            sent_timestamp: wall,
            receive_count: 0,
            first_received_at: None,
            state: MessageState::Visible,
        };

        let key = self.insert(record, attributes.message_retention_period);
        if delay > 0 {
            self.hold(key, now + secs(delay));
        }

        debug!(
            queue_name = %self.queue_name,
            message_id = %message_id,
            delay_seconds = delay,
            "Message enqueued"
        );

        Ok(SendMessageOutput {
            message_id,
            md5_of_body,
            md5_of_message_attributes: md5_of_attributes,
        })
    }

    /// Accept a message moved from another queue. It becomes visible at once
    /// and keeps its id, body, attributes, receive count and send time.
    pub fn accept_redriven(&mut self, record: MessageRecord, retention_period: u32) -> MessageKey {
        self.insert(record, retention_period)
    }

    fn insert(&mut self, mut record: MessageRecord, retention_period: u32) -> MessageKey {
        let key = MessageKey(self.next_key);
        self.next_key += 1;

        self.timers.arm(
            (LifecycleTimer::Retention, key),
            record.sent_at + secs(retention_period),
        );
        record.state = MessageState::Visible;
        self.visible.insert(key);
        self.index.insert(record.id.clone(), key);
        self.records.insert(key, record);
        key
    }

    fn hold(&mut self, key: MessageKey, until: Instant) {
        if let Some(record) = self.records.get_mut(&key) {
            record.state = MessageState::Delayed;
            self.visible.remove(&key);
            self.timers.arm((LifecycleTimer::Release, key), until);
        }
    }

    /// Fire every timer due at or before `now`.
    pub fn advance(&mut self, now: Instant) -> Advance {
        let mut report = Advance::default();

        for key in self.visibility.fire_expired(now) {
            if let Some(record) = self.records.get_mut(&key) {
                record.state = MessageState::Visible;
                self.visible.insert(key);
                report.returned += 1;
            }
        }

        for ((kind, key), _) in self.timers.pop_expired(now) {
            match kind {
                LifecycleTimer::Release => {
                    if let Some(record) = self.records.get_mut(&key) {
                        if record.state == MessageState::Delayed {
                            record.state = MessageState::Visible;
                            self.visible.insert(key);
                            report.released += 1;
                        }
                    }
                }
                LifecycleTimer::Retention => {
                    if let Some(record) = self.remove(key) {
                        debug!(
                            queue_name = %self.queue_name,
                            message_id = %record.id,
                            "Message expired by retention"
                        );
                        report.expired += 1;
                    }
                }
            }
        }

        report
    }

    /// Earliest pending timer of any kind.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.timers.next_deadline(), self.visibility.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Deliver up to `request.max_messages` visible messages, oldest first.
    ///
    /// When a `router` is given, messages whose receive count crosses its
    /// threshold are handed to it instead of being delivered.
    pub fn receive(
        &mut self,
        request: &DeliveryRequest<'_>,
        now: Instant,
        wall: DateTime<Utc>,
        mut router: Option<&mut DeadLetterRouter<'_>>,
    ) -> ReceiveOutcome {
        let mut outcome = ReceiveOutcome::default();

        while outcome.messages.len() < request.max_messages {
            let Some(key) = self.visible.pop_first() else {
                break;
            };

            let receive_count = match self.records.get_mut(&key) {
                Some(record) => {
                    record.receive_count += 1;
                    record.receive_count
                }
                None => continue,
            };

            if let Some(router) = router.as_deref_mut() {
                if router.should_redrive(receive_count) {
                    if let Some(mut record) = self.remove(key) {
                        // The attempt that crossed the threshold is not a delivery.
                        record.receive_count -= 1;
                        outcome.redriven.push(record.id.clone());
                        router.route(record);
                    }
                    continue;
                }
            }

            if let Some(message) = self.deliver(key, request, now, wall) {
                outcome.messages.push(message);
            }
        }

        outcome
    }

    fn deliver(
        &mut self,
        key: MessageKey,
        request: &DeliveryRequest<'_>,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Option<ReceivedMessage> {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let record = self.records.get_mut(&key)?;
        record.state = MessageState::InFlight;
        let first_received_at = *record.first_received_at.get_or_insert(wall);

        self.visibility
            .arm(key, epoch, now, now + secs(request.visibility_timeout));

        let attributes = request
            .attribute_names
            .iter()
            .map(|name| {
                let value = match name {
                    MessageSystemAttributeName::SenderId => record.sender_id.clone(),
                    MessageSystemAttributeName::SentTimestamp => {
                        record.sent_timestamp.timestamp_millis().to_string()
                    }
                    MessageSystemAttributeName::ApproximateReceiveCount => {
                        record.receive_count.to_string()
                    }
                    MessageSystemAttributeName::ApproximateFirstReceiveTimestamp => {
                        first_received_at.timestamp_millis().to_string()
                    }
                };
                (*name, value)
            })
            .collect::<BTreeMap<_, _>>();

        let message_attributes =
            select_message_attributes(&record.attributes, request.message_attribute_names);

        debug!(
            queue_name = %self.queue_name,
            message_id = %record.id,
            receive_count = record.receive_count,
            "Message delivered"
        );

        Some(ReceivedMessage {
            message_id: record.id.clone(),
            receipt_handle: generate_receipt_handle(&self.queue_name, &record.id, epoch),
            body: record.body.clone(),
            md5_of_body: record.md5_of_body.clone(),
            md5_of_message_attributes: md5_of_attributes(&message_attributes),
            attributes,
            message_attributes,
        })
    }

    /// Delete the message a current receipt handle refers to.
    pub fn delete(&mut self, handle: &ReceiptHandleData) -> Result<MessageId> {
        let key = self.lookup(&handle.message_id)?;
        match self.visibility.check(key, handle.epoch) {
            HandleStatus::Current(_) => {
                self.remove(key);
                debug!(
                    queue_name = %self.queue_name,
                    message_id = %handle.message_id,
                    "Message deleted"
                );
                Ok(handle.message_id.clone())
            }
            HandleStatus::Superseded | HandleStatus::NotInFlight => {
                Err(Error::ReceiptHandleIsInvalid)
            }
        }
    }

    /// Reset the visibility deadline of a current delivery to `now + timeout`.
    pub fn change_visibility(
        &mut self,
        handle: &ReceiptHandleData,
        visibility_timeout: u32,
        now: Instant,
    ) -> Result<()> {
        let key = self.lookup(&handle.message_id)?;
        let state = self.records.get(&key).map(|r| r.state);
        if state != Some(MessageState::InFlight) {
            return Err(Error::MessageNotInflight(handle.message_id.to_string()));
        }

        let delivery = match self.visibility.check(key, handle.epoch) {
            HandleStatus::Current(delivery) => delivery,
            HandleStatus::Superseded | HandleStatus::NotInFlight => {
                return Err(Error::ReceiptHandleIsInvalid)
            }
        };

        let deadline = now + secs(visibility_timeout);
        if deadline > delivery.received_at + secs(MAX_VISIBILITY_TIMEOUT) {
            return Err(Error::invalid_parameter(
                "VisibilityTimeout",
                format!(
                    "Value {} would extend visibility beyond 12 hours from the receive",
                    visibility_timeout
                ),
            ));
        }

        self.visibility.rearm(key, deadline);
        debug!(
            queue_name = %self.queue_name,
            message_id = %handle.message_id,
            visibility_timeout,
            "Visibility changed"
        );
        Ok(())
    }

    /// Remove a message in any state, disarming all of its timers.
    pub fn remove(&mut self, key: MessageKey) -> Option<MessageRecord> {
        let mut record = self.records.remove(&key)?;
        self.index.remove(&record.id);
        self.visible.remove(&key);
        self.timers.disarm(&(LifecycleTimer::Release, key));
        self.timers.disarm(&(LifecycleTimer::Retention, key));
        self.visibility.disarm(key);
        record.state = MessageState::Deleted;
        Some(record)
    }

    /// Remove every message; returns how many there were.
    pub fn purge(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.index.clear();
        self.visible.clear();
        self.timers.clear();
        self.visibility.clear();
        count
    }

    /// State of a message by id.
    pub fn state_of(&self, message_id: &MessageId) -> MessageState {
        self.index
            .get(message_id)
            .and_then(|key| self.records.get(key))
            .map_or(MessageState::Deleted, |record| record.state)
    }

    /// Number of in-flight messages.
    pub fn in_flight_count(&self) -> usize {
        self.visibility.len()
    }

    /// Total stored messages.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no messages.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Approximate message counts.
    pub fn stats(&self) -> QueueStats {
        let visible = self.visible.len();
        let in_flight = self.visibility.len();
        QueueStats {
            visible: visible as u64,
            in_flight: in_flight as u64,
            delayed: self.records.len().saturating_sub(visible + in_flight) as u64,
        }
    }

    fn lookup(&self, message_id: &MessageId) -> Result<MessageKey> {
        self.index
            .get(message_id)
            .copied()
            .ok_or_else(|| Error::InvalidIdFormat(message_id.to_string()))
    }
}

fn secs(seconds: u32) -> Duration {
    Duration::from_secs(u64::from(seconds))
}

/// Pick the message attributes a receive asked for.
///
/// `All` and `.*` select everything; `prefix.*` selects by prefix.
fn select_message_attributes(attributes: &MessageAttributes, filters: &[String]) -> MessageAttributes {
    attributes
        .iter()
        .filter(|(name, _)| {
            filters.iter().any(|filter| match filter.as_str() {
                "All" | ".*" => true,
                f => match f.strip_suffix('*').filter(|prefix| prefix.ends_with('.')) {
                    Some(prefix) => name.starts_with(prefix),
                    None => *name == f,
                },
            })
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::receipt::parse_receipt_handle;
    use crate::types::MessageAttributeValue;

    fn store_with(body: &str, attributes: &QueueAttributes) -> (MessageStore, MessageId) {
        let mut store = MessageStore::new("test-queue");
        let out = store
            .enqueue(
                SendMessageInput::new(body),
                attributes,
                "000000000000",
                Instant::now(),
                Utc::now(),
            )
            .unwrap();
        (store, out.message_id)
    }

    fn request(max: usize, timeout: u32) -> DeliveryRequest<'static> {
        DeliveryRequest {
            max_messages: max,
            visibility_timeout: timeout,
            attribute_names: &[],
            message_attribute_names: &[],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_rejects_oversized() {
        let mut attributes = QueueAttributes::default();
        attributes.maximum_message_size = 1024;
        let mut store = MessageStore::new("q");
        let err = store
            .enqueue(
                SendMessageInput::new("x".repeat(1025)),
                &attributes,
                "acct",
                Instant::now(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "MessageTooLong");
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_message_released() {
        let mut attributes = QueueAttributes::default();
        attributes.delay_seconds = 10;
        let (mut store, id) = store_with("later", &attributes);
        assert_eq!(store.state_of(&id), MessageState::Delayed);
        assert_eq!(store.stats().delayed, 1);

        let start = Instant::now();
        assert!(store.receive(&request(10, 30), start, Utc::now(), None).messages.is_empty());

        let report = store.advance(start + Duration::from_secs(10));
        assert_eq!(report.released, 1);
        assert_eq!(store.state_of(&id), MessageState::Visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_expiry_invalidates_handle() {
        let (mut store, id) = store_with("hello", &QueueAttributes::default());
        let now = Instant::now();

        let first = store.receive(&request(1, 30), now, Utc::now(), None).messages;
        assert_eq!(first.len(), 1);
        assert_eq!(store.state_of(&id), MessageState::InFlight);

        let report = store.advance(now + Duration::from_secs(30));
        assert_eq!(report.returned, 1);

        let handle = parse_receipt_handle(&first[0].receipt_handle).unwrap();
        assert!(matches!(store.delete(&handle), Err(Error::ReceiptHandleIsInvalid)));
        assert!(matches!(
            store.change_visibility(&handle, 10, now + Duration::from_secs(30)),
            Err(Error::MessageNotInflight(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_then_unknown() {
        let (mut store, id) = store_with("hello", &QueueAttributes::default());
        let now = Instant::now();
        let received = store.receive(&request(1, 30), now, Utc::now(), None).messages;
        let handle = parse_receipt_handle(&received[0].receipt_handle).unwrap();

        assert_eq!(store.delete(&handle).unwrap(), id);
        assert!(matches!(store.delete(&handle), Err(Error::InvalidIdFormat(_))));
        assert_eq!(store.state_of(&id), MessageState::Deleted);
        assert!(store.next_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_visibility_twelve_hour_cap() {
        let (mut store, _) = store_with("hello", &QueueAttributes::default());
        let now = Instant::now();
        let received = store.receive(&request(1, 30), now, Utc::now(), None).messages;
        let handle = parse_receipt_handle(&received[0].receipt_handle).unwrap();

        assert!(store.change_visibility(&handle, 43_200, now).is_ok());
        let later = now + Duration::from_secs(60);
        let err = store.change_visibility(&handle, 43_200, later).unwrap_err();
        assert_eq!(err.code(), "InvalidParameterValue");
        assert!(store.change_visibility(&handle, 43_140, later).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_removes_in_flight() {
        let mut attributes = QueueAttributes::default();
        attributes.message_retention_period = 60;
        let (mut store, id) = store_with("short-lived", &attributes);
        let now = Instant::now();
        store.receive(&request(1, 600), now, Utc::now(), None);

        let report = store.advance(now + Duration::from_secs(60));
        assert_eq!(report.expired, 1);
        assert_eq!(store.state_of(&id), MessageState::Deleted);
        assert_eq!(store.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_filters_message_attributes() {
        let mut store = MessageStore::new("q");
        let mut input = SendMessageInput::new("body");
        input
            .attributes
            .insert("trace.id".to_string(), MessageAttributeValue::string("t1"));
        input
            .attributes
            .insert("priority".to_string(), MessageAttributeValue::number("5"));
        store
            .enqueue(input, &QueueAttributes::default(), "acct", Instant::now(), Utc::now())
            .unwrap();

        let filters = vec!["trace.*".to_string()];
        let names = [MessageSystemAttributeName::ApproximateReceiveCount];
        let request = DeliveryRequest {
            max_messages: 1,
            visibility_timeout: 30,
            attribute_names: &names,
            message_attribute_names: &filters,
        };
        let messages = store.receive(&request, Instant::now(), Utc::now(), None).messages;

        assert_eq!(messages[0].message_attributes.len(), 1);
        assert!(messages[0].message_attributes.contains_key("trace.id"));
        assert!(messages[0].md5_of_message_attributes.is_some());
        assert_eq!(
            messages[0].attributes[&MessageSystemAttributeName::ApproximateReceiveCount],
            "1"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_clears_everything() {
        let (mut store, _) = store_with("a", &QueueAttributes::default());
        store
            .enqueue(
                SendMessageInput::new("b"),
                &QueueAttributes::default(),
                "acct",
                Instant::now(),
                Utc::now(),
            )
            .unwrap();
        store.receive(&request(1, 30), Instant::now(), Utc::now(), None);

        assert_eq!(store.purge(), 2);
        assert_eq!(store.stats(), QueueStats::default());
        assert!(store.next_deadline().is_none());
    }
}

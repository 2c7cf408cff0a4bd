//! Message records and their lifecycle states.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::types::{MessageAttributes, MessageId};

pub mod memory;

pub use memory::MessageStore;

/// Arena key of a message within its queue's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey(pub u64);

/// Lifecycle state of a stored message.
///
/// A deleted message is removed from the store, so `Deleted` is only ever
/// reported for records handed back by a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Waiting out its delivery delay.
    Delayed,
    /// Available for receive.
    Visible,
    /// Delivered and hidden until its visibility deadline.
    InFlight,
    /// Removed by delete, retention, purge or redrive.
    Deleted,
}

/// A stored message.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Message id.
    pub id: MessageId,
    /// Message body.
    pub body: String,
    /// Message attributes.
    pub attributes: MessageAttributes,
    /// MD5 of the body.
    pub md5_of_body: String,
    /// MD5 of the attributes.
    pub md5_of_attributes: Option<String>,
    /// Account that sent the message.
    pub sender_id: String,
    /// Monotonic send instant; retention counts from here.
    pub sent_at: Instant,
    /// Wall-clock send time.
    pub sent_timestamp: DateTime<Utc>,
    /// Deliveries so far.
    pub receive_count: u32,
    /// Wall-clock time of the first delivery.
    pub first_received_at: Option<DateTime<Utc>>,
    /// Current state.
    pub state: MessageState,
}

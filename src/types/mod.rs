//! Common data types for siloq.

pub mod attributes;
pub mod digest;
pub mod policy;
pub mod validation;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random message ID.
    pub fn new() -> Self {
        MessageId(Uuid::new_v4().to_string())
    }

    /// Create a message ID from a string.
    pub fn from_string(s: String) -> Self {
        MessageId(s)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message attributes, ordered by name.
pub type MessageAttributes = BTreeMap<String, MessageAttributeValue>;

/// Base data type of a message attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeDataType {
    /// UTF-8 text.
    String,
    /// Decimal number carried as text.
    Number,
    /// Raw bytes.
    Binary,
}

/// Message attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttributeValue {
    /// Data type (String, Number, Binary), optionally with a `.label` suffix.
    pub data_type: String,
    /// String value.
    pub string_value: Option<String>,
    /// Binary value.
    pub binary_value: Option<Vec<u8>>,
}

impl MessageAttributeValue {
    /// Build a `String` attribute.
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: Some(value.into()),
            binary_value: None,
        }
    }

    /// Build a `Number` attribute.
    pub fn number(value: impl Into<String>) -> Self {
        Self {
            data_type: "Number".to_string(),
            string_value: Some(value.into()),
            binary_value: None,
        }
    }

    /// Build a `Binary` attribute.
    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        Self {
            data_type: "Binary".to_string(),
            string_value: None,
            binary_value: Some(value.into()),
        }
    }

    /// Base type parsed from `data_type`, ignoring any custom label.
    pub fn base_type(&self) -> Option<AttributeDataType> {
        let base = self.data_type.split('.').next().unwrap_or_default();
        match base {
            "String" => Some(AttributeDataType::String),
            "Number" => Some(AttributeDataType::Number),
            "Binary" => Some(AttributeDataType::Binary),
            _ => None,
        }
    }

    /// Bytes this attribute counts against the message size limit.
    pub fn payload_size(&self, name: &str) -> usize {
        name.len()
            + self.data_type.len()
            + self.string_value.as_ref().map_or(0, String::len)
            + self.binary_value.as_ref().map_or(0, Vec::len)
    }
}

/// A message to enqueue.
#[derive(Debug, Clone, Default)]
pub struct SendMessageInput {
    /// Message body.
    pub body: String,
    /// Message attributes.
    pub attributes: MessageAttributes,
    /// Per-message delay; falls back to the queue's `DelaySeconds`.
    pub delay_seconds: Option<u32>,
}

impl SendMessageInput {
    /// A message with only a body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Total bytes counted against `MaximumMessageSize`.
    pub fn payload_size(&self) -> usize {
        self.body.len()
            + self
                .attributes
                .iter()
                .map(|(name, value)| value.payload_size(name))
                .sum::<usize>()
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageOutput {
    /// Engine-assigned message id.
    pub message_id: MessageId,
    /// MD5 of the body.
    pub md5_of_body: String,
    /// MD5 of the message attributes, if any were sent.
    pub md5_of_message_attributes: Option<String>,
}

/// System attributes that can be requested on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageSystemAttributeName {
    /// Account that sent the message.
    SenderId,
    /// Send time, epoch milliseconds.
    SentTimestamp,
    /// Number of deliveries including this one.
    ApproximateReceiveCount,
    /// First delivery time, epoch milliseconds.
    ApproximateFirstReceiveTimestamp,
}

impl MessageSystemAttributeName {
    /// Every system attribute, in the order `All` expands to.
    pub const ALL: [Self; 4] = [
        Self::SenderId,
        Self::SentTimestamp,
        Self::ApproximateReceiveCount,
        Self::ApproximateFirstReceiveTimestamp,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SenderId => "SenderId",
            Self::SentTimestamp => "SentTimestamp",
            Self::ApproximateReceiveCount => "ApproximateReceiveCount",
            Self::ApproximateFirstReceiveTimestamp => "ApproximateFirstReceiveTimestamp",
        }
    }

    /// Expand requested names; `All` selects everything, unknown names are ignored.
    pub fn expand(names: &[String]) -> Vec<Self> {
        if names.iter().any(|n| n == "All") {
            return Self::ALL.to_vec();
        }
        let mut out: Vec<Self> = names.iter().filter_map(|n| n.parse().ok()).collect();
        out.sort();
        out.dedup();
        out
    }
}

impl FromStr for MessageSystemAttributeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SenderId" => Ok(Self::SenderId),
            "SentTimestamp" => Ok(Self::SentTimestamp),
            "ApproximateReceiveCount" => Ok(Self::ApproximateReceiveCount),
            "ApproximateFirstReceiveTimestamp" => Ok(Self::ApproximateFirstReceiveTimestamp),
            _ => Err(format!("Unknown message system attribute: {}", s)),
        }
    }
}

/// Options for receiving messages.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Maximum number of messages to receive (1-10).
    pub max_messages: u32,
    /// Visibility timeout override in seconds.
    pub visibility_timeout: Option<u32>,
    /// Long-poll wait in seconds (0-20); `None` uses the queue default.
    pub wait_time_seconds: Option<u32>,
    /// System attribute names to return.
    pub attribute_names: Vec<String>,
    /// Message attribute names to return (`All` or `.*` for every one).
    pub message_attribute_names: Vec<String>,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 1,
            visibility_timeout: None,
            wait_time_seconds: None,
            attribute_names: vec![],
            message_attribute_names: vec![],
        }
    }
}

impl ReceiveOptions {
    /// Receive up to `max_messages` with every other option defaulted.
    pub fn max(max_messages: u32) -> Self {
        Self {
            max_messages,
            ..Default::default()
        }
    }
}

/// A delivered message.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Message id.
    pub message_id: MessageId,
    /// Handle for this delivery.
    pub receipt_handle: String,
    /// Message body.
    pub body: String,
    /// MD5 of the body.
    pub md5_of_body: String,
    /// MD5 of all message attributes, if the message has any.
    pub md5_of_message_attributes: Option<String>,
    /// Requested system attributes.
    pub attributes: BTreeMap<MessageSystemAttributeName, String>,
    /// Requested message attributes.
    pub message_attributes: MessageAttributes,
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Messages available for delivery.
    pub visible: u64,
    /// Messages in flight.
    pub in_flight: u64,
    /// Messages waiting out a delay.
    pub delayed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_base_type() {
        assert_eq!(
            MessageAttributeValue::string("x").base_type(),
            Some(AttributeDataType::String)
        );
        let custom = MessageAttributeValue {
            data_type: "Number.float".to_string(),
            string_value: Some("1.5".to_string()),
            binary_value: None,
        };
        assert_eq!(custom.base_type(), Some(AttributeDataType::Number));
        let bogus = MessageAttributeValue {
            data_type: "Blob".to_string(),
            string_value: None,
            binary_value: Some(vec![1]),
        };
        assert_eq!(bogus.base_type(), None);
    }

    #[test]
    fn test_payload_size_counts_attributes() {
        let mut input = SendMessageInput::new("hello");
        input
            .attributes
            .insert("k".to_string(), MessageAttributeValue::string("vv"));
        // body 5 + name 1 + "String" 6 + value 2
        assert_eq!(input.payload_size(), 14);
    }

    #[test]
    fn test_system_attribute_expand() {
        let all = MessageSystemAttributeName::expand(&["All".to_string()]);
        assert_eq!(all.len(), 4);

        let some = MessageSystemAttributeName::expand(&[
            "SentTimestamp".to_string(),
            "Bogus".to_string(),
            "SentTimestamp".to_string(),
        ]);
        assert_eq!(some, vec![MessageSystemAttributeName::SentTimestamp]);
    }
}

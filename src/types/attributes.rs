//! Queue attribute names, typed values and the resolved attribute set.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::ValidationError;
use crate::types::policy::QueuePolicy;
use crate::types::validation::{
    MAX_DELAY_SECONDS, MAX_MESSAGE_SIZE, MAX_VISIBILITY_TIMEOUT, MAX_WAIT_TIME_SECONDS,
    MIN_MESSAGE_SIZE,
};
use crate::Result;

/// Default visibility timeout in seconds.
pub const DEFAULT_VISIBILITY_TIMEOUT: u32 = 30;
/// Default retention period in seconds (4 days).
pub const DEFAULT_RETENTION_PERIOD: u32 = 345_600;
/// Shortest retention period.
pub const MIN_RETENTION_PERIOD: u32 = 60;
/// Longest retention period (14 days).
pub const MAX_RETENTION_PERIOD: u32 = 1_209_600;
/// Largest redrive `maxReceiveCount`.
pub const MAX_RECEIVE_COUNT_LIMIT: u32 = 1_000;

/// Queue attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueAttributeName {
    /// All attributes (read requests only).
    All,
    /// Approximate number of visible messages.
    ApproximateNumberOfMessages,
    /// Approximate number of in-flight messages.
    ApproximateNumberOfMessagesNotVisible,
    /// Approximate number of delayed messages.
    ApproximateNumberOfMessagesDelayed,
    /// Creation time, epoch seconds.
    CreatedTimestamp,
    /// Last attribute change, epoch seconds.
    LastModifiedTimestamp,
    /// Queue ARN.
    QueueArn,
    /// Default delivery delay.
    DelaySeconds,
    /// Maximum message size.
    MaximumMessageSize,
    /// Message retention period.
    MessageRetentionPeriod,
    /// Access policy document.
    Policy,
    /// Default long-poll wait.
    ReceiveMessageWaitTimeSeconds,
    /// Default visibility timeout.
    VisibilityTimeout,
    /// Dead-letter redrive policy.
    RedrivePolicy,
    /// Any name not recognized.
    Unknown(String),
}

impl QueueAttributeName {
    /// Every concrete attribute, in the order `All` expands to.
    pub const EVERY: [QueueAttributeName; 13] = [
        Self::ApproximateNumberOfMessages,
        Self::ApproximateNumberOfMessagesNotVisible,
        Self::ApproximateNumberOfMessagesDelayed,
        Self::CreatedTimestamp,
        Self::LastModifiedTimestamp,
        Self::QueueArn,
        Self::DelaySeconds,
        Self::MaximumMessageSize,
        Self::MessageRetentionPeriod,
        Self::Policy,
        Self::ReceiveMessageWaitTimeSeconds,
        Self::VisibilityTimeout,
        Self::RedrivePolicy,
    ];

    /// Parse a wire name. Never fails; unrecognized names become `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "All" => Self::All,
            "ApproximateNumberOfMessages" => Self::ApproximateNumberOfMessages,
            "ApproximateNumberOfMessagesNotVisible" => Self::ApproximateNumberOfMessagesNotVisible,
            "ApproximateNumberOfMessagesDelayed" => Self::ApproximateNumberOfMessagesDelayed,
            "CreatedTimestamp" => Self::CreatedTimestamp,
            "LastModifiedTimestamp" => Self::LastModifiedTimestamp,
            "QueueArn" => Self::QueueArn,
            "DelaySeconds" => Self::DelaySeconds,
            "MaximumMessageSize" => Self::MaximumMessageSize,
            "MessageRetentionPeriod" => Self::MessageRetentionPeriod,
            "Policy" => Self::Policy,
            "ReceiveMessageWaitTimeSeconds" => Self::ReceiveMessageWaitTimeSeconds,
            "VisibilityTimeout" => Self::VisibilityTimeout,
            "RedrivePolicy" => Self::RedrivePolicy,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "All",
            Self::ApproximateNumberOfMessages => "ApproximateNumberOfMessages",
            Self::ApproximateNumberOfMessagesNotVisible => "ApproximateNumberOfMessagesNotVisible",
            Self::ApproximateNumberOfMessagesDelayed => "ApproximateNumberOfMessagesDelayed",
            Self::CreatedTimestamp => "CreatedTimestamp",
            Self::LastModifiedTimestamp => "LastModifiedTimestamp",
            Self::QueueArn => "QueueArn",
            Self::DelaySeconds => "DelaySeconds",
            Self::MaximumMessageSize => "MaximumMessageSize",
            Self::MessageRetentionPeriod => "MessageRetentionPeriod",
            Self::Policy => "Policy",
            Self::ReceiveMessageWaitTimeSeconds => "ReceiveMessageWaitTimeSeconds",
            Self::VisibilityTimeout => "VisibilityTimeout",
            Self::RedrivePolicy => "RedrivePolicy",
            Self::Unknown(name) => name,
        }
    }

    /// Derived attributes that SetQueueAttributes ignores.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::ApproximateNumberOfMessages
                | Self::ApproximateNumberOfMessagesNotVisible
                | Self::ApproximateNumberOfMessagesDelayed
                | Self::CreatedTimestamp
                | Self::LastModifiedTimestamp
                | Self::QueueArn
        )
    }

    /// Resolve requested names for a read, expanding `All`.
    pub fn expand(names: &[String]) -> Result<Vec<Self>> {
        let mut out = Vec::new();
        for raw in names {
            match Self::parse(raw) {
                Self::All => return Ok(Self::EVERY.to_vec()),
                Self::Unknown(name) => {
                    return Err(ValidationError::InvalidAttributeName(name).into())
                }
                name => out.push(name),
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }
}

impl fmt::Display for QueueAttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dead-letter redrive policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedrivePolicy {
    /// ARN of the dead-letter queue.
    pub dead_letter_target_arn: String,
    /// Receives allowed before a message is moved.
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    /// Parse the JSON form `{"deadLetterTargetArn": ..., "maxReceiveCount": ...}`.
    ///
    /// `maxReceiveCount` is accepted as a number or a numeric string.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| -> crate::Error {
            ValidationError::InvalidAttributeValue {
                name: "RedrivePolicy".to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        let value: Value = serde_json::from_str(raw).map_err(|e| invalid(&e.to_string()))?;

        let dead_letter_target_arn = value
            .get("deadLetterTargetArn")
            .and_then(Value::as_str)
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| invalid("deadLetterTargetArn is required"))?
            .to_string();

        let max_receive_count = match value.get("maxReceiveCount") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse::<u64>().ok(),
            _ => None,
        }
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| (1..=MAX_RECEIVE_COUNT_LIMIT).contains(n))
        .ok_or_else(|| invalid("maxReceiveCount must be an integer between 1 and 1000"))?;

        Ok(Self {
            dead_letter_target_arn,
            max_receive_count,
        })
    }

    /// Queue name at the end of the target ARN.
    pub fn target_queue_name(&self) -> &str {
        self.dead_letter_target_arn
            .rsplit(':')
            .next()
            .unwrap_or(&self.dead_letter_target_arn)
    }

    /// JSON form.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "deadLetterTargetArn": self.dead_letter_target_arn,
            "maxReceiveCount": self.max_receive_count,
        })
        .to_string()
    }
}

/// A validated value for one writable attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueAttributeValue {
    /// Default visibility timeout.
    VisibilityTimeout(u32),
    /// Default delivery delay.
    DelaySeconds(u32),
    /// Maximum message size in bytes.
    MaximumMessageSize(usize),
    /// Retention period in seconds.
    MessageRetentionPeriod(u32),
    /// Default long-poll wait.
    ReceiveMessageWaitTimeSeconds(u32),
    /// Redrive policy; `None` clears it.
    RedrivePolicy(Option<RedrivePolicy>),
    /// Access policy; `None` clears it.
    Policy(Option<QueuePolicy>),
}

impl QueueAttributeValue {
    /// Parse a raw attribute for a write.
    ///
    /// Returns `Ok(None)` for read-only attributes, which writes ignore.
    pub fn parse(name: &QueueAttributeName, raw: &str) -> Result<Option<Self>> {
        let value = match name {
            QueueAttributeName::VisibilityTimeout => {
                Self::VisibilityTimeout(parse_bounded(name, raw, 0, MAX_VISIBILITY_TIMEOUT)?)
            }
            QueueAttributeName::DelaySeconds => {
                Self::DelaySeconds(parse_bounded(name, raw, 0, MAX_DELAY_SECONDS)?)
            }
            QueueAttributeName::MaximumMessageSize => Self::MaximumMessageSize(parse_bounded(
                name,
                raw,
                MIN_MESSAGE_SIZE as u32,
                MAX_MESSAGE_SIZE as u32,
            )? as usize),
            QueueAttributeName::MessageRetentionPeriod => Self::MessageRetentionPeriod(
                parse_bounded(name, raw, MIN_RETENTION_PERIOD, MAX_RETENTION_PERIOD)?,
            ),
            QueueAttributeName::ReceiveMessageWaitTimeSeconds => {
                Self::ReceiveMessageWaitTimeSeconds(parse_bounded(
                    name,
                    raw,
                    0,
                    MAX_WAIT_TIME_SECONDS,
                )?)
            }
            QueueAttributeName::RedrivePolicy => Self::RedrivePolicy(if raw.trim().is_empty() {
                None
            } else {
                Some(RedrivePolicy::parse(raw)?)
            }),
            QueueAttributeName::Policy => Self::Policy(if raw.trim().is_empty() {
                None
            } else {
                Some(QueuePolicy::parse(raw)?)
            }),
            QueueAttributeName::All | QueueAttributeName::Unknown(_) => {
                return Err(ValidationError::InvalidAttributeName(name.to_string()).into())
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Parse a raw name/value map, rejecting unknown names.
    pub fn parse_map(raw: &HashMap<String, String>) -> Result<Vec<Self>> {
        let mut names: Vec<_> = raw.keys().collect();
        names.sort();

        let mut values = Vec::with_capacity(raw.len());
        for key in names {
            let name = QueueAttributeName::parse(key);
            if let Some(value) = Self::parse(&name, &raw[key])? {
                values.push(value);
            }
        }
        Ok(values)
    }
}

fn parse_bounded(name: &QueueAttributeName, raw: &str, min: u32, max: u32) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| {
            ValidationError::InvalidAttributeValue {
                name: name.to_string(),
                reason: format!("'{}' must be an integer between {} and {}", raw, min, max),
            }
            .into()
        })
}

/// Writable queue attributes with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAttributes {
    /// Visibility timeout in seconds (default: 30).
    pub visibility_timeout: u32,
    /// Delay seconds (default: 0).
    pub delay_seconds: u32,
    /// Maximum message size in bytes (default: 262144).
    pub maximum_message_size: usize,
    /// Message retention period in seconds (default: 345600).
    pub message_retention_period: u32,
    /// Long-poll wait in seconds (default: 0).
    pub receive_message_wait_time_seconds: u32,
    /// Dead-letter redrive policy.
    pub redrive_policy: Option<RedrivePolicy>,
    /// Access policy.
    pub policy: Option<QueuePolicy>,
}

impl Default for QueueAttributes {
    fn default() -> Self {
        Self {
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            delay_seconds: 0,
            maximum_message_size: MAX_MESSAGE_SIZE,
            message_retention_period: DEFAULT_RETENTION_PERIOD,
            receive_message_wait_time_seconds: 0,
            redrive_policy: None,
            policy: None,
        }
    }
}

impl QueueAttributes {
    /// Defaults overridden by `values`.
    pub fn with_values(values: Vec<QueueAttributeValue>) -> Self {
        let mut attributes = Self::default();
        for value in values {
            attributes.apply(value);
        }
        attributes
    }

    /// Overwrite one attribute.
    pub fn apply(&mut self, value: QueueAttributeValue) {
        match value {
            QueueAttributeValue::VisibilityTimeout(v) => self.visibility_timeout = v,
            QueueAttributeValue::DelaySeconds(v) => self.delay_seconds = v,
            QueueAttributeValue::MaximumMessageSize(v) => self.maximum_message_size = v,
            QueueAttributeValue::MessageRetentionPeriod(v) => self.message_retention_period = v,
            QueueAttributeValue::ReceiveMessageWaitTimeSeconds(v) => {
                self.receive_message_wait_time_seconds = v
            }
            QueueAttributeValue::RedrivePolicy(v) => self.redrive_policy = v,
            QueueAttributeValue::Policy(v) => self.policy = v,
        }
    }

    /// Wire value of a stored (non-derived) attribute.
    ///
    /// Unset policies render as `None`, derived attributes always do.
    pub fn render(&self, name: &QueueAttributeName) -> Option<String> {
        match name {
            QueueAttributeName::VisibilityTimeout => Some(self.visibility_timeout.to_string()),
            QueueAttributeName::DelaySeconds => Some(self.delay_seconds.to_string()),
            QueueAttributeName::MaximumMessageSize => Some(self.maximum_message_size.to_string()),
            QueueAttributeName::MessageRetentionPeriod => {
                Some(self.message_retention_period.to_string())
            }
            QueueAttributeName::ReceiveMessageWaitTimeSeconds => {
                Some(self.receive_message_wait_time_seconds.to_string())
            }
            QueueAttributeName::RedrivePolicy => {
                self.redrive_policy.as_ref().map(RedrivePolicy::to_json)
            }
            QueueAttributeName::Policy => self.policy.as_ref().map(QueuePolicy::to_json),
            _ => None,
        }
    }
}

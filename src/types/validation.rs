//! Validation functions for queue names, message contents and request parameters.

use crate::error::ValidationError;
use crate::types::{AttributeDataType, MessageAttributes, SendMessageInput};
use crate::Result;

/// Default and upper bound of `MaximumMessageSize` (256 KiB).
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// Lower bound of `MaximumMessageSize`.
pub const MIN_MESSAGE_SIZE: usize = 1_024;

/// Largest combined payload of a send batch.
pub const MAX_BATCH_PAYLOAD: usize = 262_144;

/// Largest visibility timeout, and the cap on total in-flight time (12 hours).
pub const MAX_VISIBILITY_TIMEOUT: u32 = 43_200;

/// Largest delivery delay (15 minutes).
pub const MAX_DELAY_SECONDS: u32 = 900;

/// Largest long-poll wait.
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Most messages a single receive may return.
pub const MAX_RECEIVE_MESSAGES: u32 = 10;

/// Most message attributes on a message.
pub const MAX_MESSAGE_ATTRIBUTES: usize = 10;

/// Queue name validation (1-80 chars, alphanumeric + `-` and `_`).
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 80 {
        return Err(ValidationError::InvalidParameterValue {
            name: "QueueName".to_string(),
            reason: format!("Queue name must be 1-80 characters, got {}", name.len()),
        }
        .into());
    }
    if let Some(ch) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(ValidationError::InvalidParameterValue {
            name: "QueueName".to_string(),
            reason: format!("Queue name contains invalid character: '{}'", ch),
        }
        .into());
    }
    Ok(())
}

/// Permission label validation (same rule as queue names).
pub fn validate_permission_label(label: &str) -> Result<()> {
    if label.is_empty() || label.len() > 80 || !label.chars().all(is_name_char) {
        return Err(ValidationError::InvalidParameterValue {
            name: "Label".to_string(),
            reason: format!(
                "Label must be 1-80 alphanumeric, hyphen or underscore characters: '{}'",
                label
            ),
        }
        .into());
    }
    Ok(())
}

/// Batch entry id validation (1-80 chars, alphanumeric + `-` and `_`).
pub fn validate_batch_entry_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 80 || !id.chars().all(is_name_char) {
        return Err(ValidationError::InvalidBatchEntryId(id.to_string()).into());
    }
    Ok(())
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

/// Whether a character may appear in a message body.
///
/// `#x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]`
pub fn is_allowed_body_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Reject bodies containing characters outside the allowed set.
pub fn validate_message_body(body: &str) -> Result<()> {
    if body.is_empty() {
        return Err(ValidationError::InvalidParameterValue {
            name: "MessageBody".to_string(),
            reason: "The message body must be at least one character".to_string(),
        }
        .into());
    }
    if let Some(ch) = body.chars().find(|c| !is_allowed_body_char(*c)) {
        return Err(ValidationError::InvalidMessageContents(ch as u32).into());
    }
    Ok(())
}

/// Validate message attribute names, types and values.
pub fn validate_message_attributes(attributes: &MessageAttributes) -> Result<()> {
    if attributes.len() > MAX_MESSAGE_ATTRIBUTES {
        return Err(invalid_attribute(
            "MessageAttributes",
            format!(
                "Number of message attributes [{}] exceeds the allowed maximum [{}]",
                attributes.len(),
                MAX_MESSAGE_ATTRIBUTES
            ),
        ));
    }

    for (name, value) in attributes {
        validate_message_attribute_name(name)?;

        match value.base_type() {
            None => {
                return Err(invalid_attribute(
                    name,
                    format!("Unsupported data type '{}'", value.data_type),
                ))
            }
            Some(AttributeDataType::Binary) => {
                if value.binary_value.as_ref().map_or(true, Vec::is_empty) {
                    return Err(invalid_attribute(name, "Binary attribute requires a value"));
                }
            }
            Some(kind) => {
                let text = value.string_value.as_deref().unwrap_or_default();
                if text.is_empty() {
                    return Err(invalid_attribute(name, "String attribute requires a value"));
                }
                if kind == AttributeDataType::Number && text.parse::<f64>().is_err() {
                    return Err(invalid_attribute(
                        name,
                        format!("Value '{}' is not a valid number", text),
                    ));
                }
                if let Some(ch) = text.chars().find(|c| !is_allowed_body_char(*c)) {
                    return Err(ValidationError::InvalidMessageContents(ch as u32).into());
                }
            }
        }
    }
    Ok(())
}

fn validate_message_attribute_name(name: &str) -> Result<()> {
    let lower = name.to_ascii_lowercase();
    let valid = !name.is_empty()
        && name.len() <= 256
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
        && !lower.starts_with("aws.")
        && !lower.starts_with("amazon.");

    if valid {
        Ok(())
    } else {
        Err(invalid_attribute(name, "Invalid message attribute name"))
    }
}

fn invalid_attribute(name: &str, reason: impl Into<String>) -> crate::Error {
    ValidationError::InvalidParameterValue {
        name: format!("MessageAttribute.{}", name),
        reason: reason.into(),
    }
    .into()
}

/// Validate message size against a queue's limit.
pub fn validate_message_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(ValidationError::MessageTooLong { size, max: max_size }.into());
    }
    Ok(())
}

/// Validate everything about an outgoing message except queue-specific size.
pub fn validate_send_input(input: &SendMessageInput) -> Result<()> {
    validate_message_body(&input.body)?;
    validate_message_attributes(&input.attributes)?;
    if let Some(delay) = input.delay_seconds {
        validate_range("DelaySeconds", delay, 0, MAX_DELAY_SECONDS)?;
    }
    Ok(())
}

/// Check `value` lies in `min..=max`.
pub fn validate_range(name: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(ValidationError::InvalidParameterValue {
            name: name.to_string(),
            reason: format!("Value {} must be between {} and {}", value, min, max),
        }
        .into());
    }
    Ok(())
}

//! Error types for siloq.

use thiserror::Error;

/// Result type for siloq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for siloq.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client input was rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Queue does not exist or has been deleted.
    #[error("Queue does not exist: {0}")]
    QueueDoesNotExist(String),

    /// Queue exists with different attributes.
    #[error("Queue already exists with different attributes: {0}")]
    QueueNameExists(String),

    /// Queue with this name was deleted within the grace period.
    #[error("Queue was deleted recently, wait before re-creating: {0}")]
    QueueDeletedRecently(String),

    /// A purge of this queue is still in progress.
    #[error("Only one PurgeQueue operation is allowed every 60 seconds: {0}")]
    PurgeQueueInProgress(String),

    /// Receipt handle is malformed, superseded or expired.
    #[error("The receipt handle is not valid for this operation")]
    ReceiptHandleIsInvalid,

    /// The receipt handle refers to a message the queue does not hold.
    #[error("Message does not exist: {0}")]
    InvalidIdFormat(String),

    /// The message is not in flight.
    #[error("Message is not in flight: {0}")]
    MessageNotInflight(String),

    /// A queue limit was exceeded.
    #[error("Over limit: {0}")]
    OverLimit(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Service error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::QueueDoesNotExist(_) => "AWS.SimpleQueueService.NonExistentQueue",
            Self::QueueNameExists(_) => "QueueAlreadyExists",
            Self::QueueDeletedRecently(_) => "AWS.SimpleQueueService.QueueDeletedRecently",
            Self::PurgeQueueInProgress(_) => "AWS.SimpleQueueService.PurgeQueueInProgress",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::InvalidIdFormat(_) => "InvalidIdFormat",
            Self::MessageNotInflight(_) => "AWS.SimpleQueueService.MessageNotInflight",
            Self::OverLimit(_) => "OverLimit",
            Self::Config(_) | Self::Serialization(_) | Self::Io(_) | Self::Internal(_) => {
                "InternalError"
            }
        }
    }

    /// Whether the caller caused the failure.
    pub fn is_sender_fault(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Serialization(_) | Self::Io(_) | Self::Internal(_)
        )
    }

    /// Shorthand for [`ValidationError::InvalidParameterValue`].
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidParameterValue {
            name: name.to_string(),
            reason: reason.into(),
        }
        .into()
    }
}

/// Client input errors. Always sender faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A parameter is out of range or malformed.
    #[error("Invalid value for parameter {name}: {reason}")]
    InvalidParameterValue {
        /// Parameter name.
        name: String,
        /// Reason for invalidity.
        reason: String,
    },

    /// Unknown queue attribute name.
    #[error("Unknown attribute: {0}")]
    InvalidAttributeName(String),

    /// Recognized attribute with an unacceptable value.
    #[error("Invalid value for attribute {name}: {reason}")]
    InvalidAttributeValue {
        /// Attribute name.
        name: String,
        /// Reason for invalidity.
        reason: String,
    },

    /// Message exceeds the queue's maximum size.
    #[error("Message too long: {size} bytes (max: {max} bytes)")]
    MessageTooLong {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message body contains a disallowed character.
    #[error("Message contains invalid character U+{0:04X}")]
    InvalidMessageContents(u32),

    /// Batch request carried no entries.
    #[error("There should be at least one entry in the request")]
    EmptyBatchRequest,

    /// Batch request carried more entries than allowed.
    #[error("Maximum number of entries per request is {max}, got {count}")]
    TooManyEntriesInBatchRequest {
        /// Entries supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Two batch entries share an id.
    #[error("Id {0} is repeated")]
    BatchEntryIdsNotDistinct(String),

    /// Batch entry id has invalid characters or length.
    #[error("Batch entry id is invalid: {0}")]
    InvalidBatchEntryId(String),

    /// Combined batch payload is too large.
    #[error("Batch requests cannot be longer than {max} bytes, got {size}")]
    BatchRequestTooLong {
        /// Combined size.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl ValidationError {
    /// Service error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameterValue { .. } => "InvalidParameterValue",
            Self::InvalidAttributeName(_) => "InvalidAttributeName",
            Self::InvalidAttributeValue { .. } => "InvalidAttributeValue",
            Self::MessageTooLong { .. } => "MessageTooLong",
            Self::InvalidMessageContents(_) => "InvalidMessageContents",
            Self::EmptyBatchRequest => "AWS.SimpleQueueService.EmptyBatchRequest",
            Self::TooManyEntriesInBatchRequest { .. } => {
                "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
            }
            Self::BatchEntryIdsNotDistinct(_) => "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
            Self::InvalidBatchEntryId(_) => "AWS.SimpleQueueService.InvalidBatchEntryId",
            Self::BatchRequestTooLong { .. } => "AWS.SimpleQueueService.BatchRequestTooLong",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::ReceiptHandleIsInvalid.code(), "ReceiptHandleIsInvalid");
        assert_eq!(
            Error::QueueDoesNotExist("q".into()).code(),
            "AWS.SimpleQueueService.NonExistentQueue"
        );
        let err: Error = ValidationError::MessageTooLong { size: 10, max: 5 }.into();
        assert_eq!(err.code(), "MessageTooLong");
    }

    #[test]
    fn test_sender_fault_classification() {
        assert!(Error::OverLimit("inflight".into()).is_sender_fault());
        assert!(Error::invalid_parameter("MaxNumberOfMessages", "too big").is_sender_fault());
        assert!(!Error::Internal("boom".into()).is_sender_fault());
    }
}

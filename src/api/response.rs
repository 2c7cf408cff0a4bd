//! One response variant per operation, plus the error envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::Action;
use crate::core::batch::BatchOutput;
use crate::types::attributes::QueueAttributeName;
use crate::types::{ReceivedMessage, SendMessageOutput};
use crate::Error;

/// Result of a successful operation.
#[derive(Debug, Clone)]
pub enum Response {
    /// Permission added.
    AddPermission,
    /// Permission removed.
    RemovePermission,
    /// Queue created or already present.
    CreateQueue {
        /// Queue URL.
        queue_url: String,
    },
    /// Queue deleted.
    DeleteQueue,
    /// Queue resolved.
    GetQueueUrl {
        /// Queue URL.
        queue_url: String,
    },
    /// Attributes read.
    GetQueueAttributes {
        /// Attribute values.
        attributes: BTreeMap<QueueAttributeName, String>,
    },
    /// Attributes written.
    SetQueueAttributes,
    /// Queue URLs.
    ListQueues {
        /// Queue URLs.
        queue_urls: Vec<String>,
    },
    /// Source queue URLs.
    ListDeadLetterSourceQueues {
        /// Queue URLs.
        queue_urls: Vec<String>,
    },
    /// Queue purged.
    PurgeQueue,
    /// Message sent.
    SendMessage(SendMessageOutput),
    /// Batch sent.
    SendMessageBatch(BatchOutput<SendMessageOutput>),
    /// Messages received.
    ReceiveMessage {
        /// Delivered messages.
        messages: Vec<ReceivedMessage>,
    },
    /// Message deleted.
    DeleteMessage,
    /// Batch deleted.
    DeleteMessageBatch(BatchOutput<()>),
    /// Visibility changed.
    ChangeMessageVisibility,
    /// Batch visibility changed.
    ChangeMessageVisibilityBatch(BatchOutput<()>),
}

impl Response {
    /// Operation this response answers.
    pub fn action(&self) -> Action {
        match self {
            Self::AddPermission => Action::AddPermission,
            Self::RemovePermission => Action::RemovePermission,
            Self::CreateQueue { .. } => Action::CreateQueue,
            Self::DeleteQueue => Action::DeleteQueue,
            Self::GetQueueUrl { .. } => Action::GetQueueUrl,
            Self::GetQueueAttributes { .. } => Action::GetQueueAttributes,
            Self::SetQueueAttributes => Action::SetQueueAttributes,
            Self::ListQueues { .. } => Action::ListQueues,
            Self::ListDeadLetterSourceQueues { .. } => Action::ListDeadLetterSourceQueues,
            Self::PurgeQueue => Action::PurgeQueue,
            Self::SendMessage(_) => Action::SendMessage,
            Self::SendMessageBatch(_) => Action::SendMessageBatch,
            Self::ReceiveMessage { .. } => Action::ReceiveMessage,
            Self::DeleteMessage => Action::DeleteMessage,
            Self::DeleteMessageBatch(_) => Action::DeleteMessageBatch,
            Self::ChangeMessageVisibility => Action::ChangeMessageVisibility,
            Self::ChangeMessageVisibilityBatch(_) => Action::ChangeMessageVisibilityBatch,
        }
    }
}

/// Error envelope handed to a wire binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    /// Service error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the caller caused the failure.
    pub sender_fault: bool,
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            sender_fault: error.is_sender_fault(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_from_error() {
        let response = ErrorResponse::from(&Error::QueueDoesNotExist("q".to_string()));
        assert_eq!(response.code, "AWS.SimpleQueueService.NonExistentQueue");
        assert!(response.sender_fault);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["SenderFault"], true);

        let internal = ErrorResponse::from(&Error::Internal("boom".to_string()));
        assert_eq!(internal.code, "InternalError");
        assert!(!internal.sender_fault);
    }
}

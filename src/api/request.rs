//! One request variant per operation.

use std::collections::HashMap;

use crate::api::Action;
use crate::core::batch::{
    ChangeMessageVisibilityBatchEntry, DeleteMessageBatchEntry, SendMessageBatchEntry,
};
use crate::types::policy::PermissionAction;
use crate::types::{ReceiveOptions, SendMessageInput};

/// A queue operation with its parameters.
#[derive(Debug, Clone)]
pub enum Request {
    /// Grant actions to accounts under a label.
    AddPermission {
        /// Queue URL.
        queue_url: String,
        /// Statement label.
        label: String,
        /// Grantee account ids.
        account_ids: Vec<String>,
        /// Granted actions.
        actions: Vec<PermissionAction>,
    },
    /// Remove a labelled permission.
    RemovePermission {
        /// Queue URL.
        queue_url: String,
        /// Statement label.
        label: String,
    },
    /// Create a queue.
    CreateQueue {
        /// Queue name.
        queue_name: String,
        /// Raw attributes.
        attributes: HashMap<String, String>,
    },
    /// Delete a queue.
    DeleteQueue {
        /// Queue URL.
        queue_url: String,
    },
    /// Resolve a queue name.
    GetQueueUrl {
        /// Queue name.
        queue_name: String,
    },
    /// Read attributes.
    GetQueueAttributes {
        /// Queue URL.
        queue_url: String,
        /// Requested names.
        attribute_names: Vec<String>,
    },
    /// Write attributes.
    SetQueueAttributes {
        /// Queue URL.
        queue_url: String,
        /// Raw attributes.
        attributes: HashMap<String, String>,
    },
    /// List queue URLs.
    ListQueues {
        /// Optional name prefix.
        queue_name_prefix: Option<String>,
    },
    /// List queues redriving into a queue.
    ListDeadLetterSourceQueues {
        /// Dead-letter queue URL.
        queue_url: String,
    },
    /// Remove every message.
    PurgeQueue {
        /// Queue URL.
        queue_url: String,
    },
    /// Send one message.
    SendMessage {
        /// Queue URL.
        queue_url: String,
        /// Message.
        input: SendMessageInput,
    },
    /// Send up to ten messages.
    SendMessageBatch {
        /// Queue URL.
        queue_url: String,
        /// Entries.
        entries: Vec<SendMessageBatchEntry>,
    },
    /// Receive messages.
    ReceiveMessage {
        /// Queue URL.
        queue_url: String,
        /// Receive options.
        options: ReceiveOptions,
    },
    /// Delete one message.
    DeleteMessage {
        /// Queue URL.
        queue_url: String,
        /// Receipt handle.
        receipt_handle: String,
    },
    /// Delete up to ten messages.
    DeleteMessageBatch {
        /// Queue URL.
        queue_url: String,
        /// Entries.
        entries: Vec<DeleteMessageBatchEntry>,
    },
    /// Change one visibility timeout.
    ChangeMessageVisibility {
        /// Queue URL.
        queue_url: String,
        /// Receipt handle.
        receipt_handle: String,
        /// New timeout in seconds.
        visibility_timeout: u32,
    },
    /// Change up to ten visibility timeouts.
    ChangeMessageVisibilityBatch {
        /// Queue URL.
        queue_url: String,
        /// Entries.
        entries: Vec<ChangeMessageVisibilityBatchEntry>,
    },
}

impl Request {
    /// Operation name of this request.
    pub fn action(&self) -> Action {
        match self {
            Self::AddPermission { .. } => Action::AddPermission,
            Self::RemovePermission { .. } => Action::RemovePermission,
            Self::CreateQueue { .. } => Action::CreateQueue,
            Self::DeleteQueue { .. } => Action::DeleteQueue,
            Self::GetQueueUrl { .. } => Action::GetQueueUrl,
            Self::GetQueueAttributes { .. } => Action::GetQueueAttributes,
            Self::SetQueueAttributes { .. } => Action::SetQueueAttributes,
            Self::ListQueues { .. } => Action::ListQueues,
            Self::ListDeadLetterSourceQueues { .. } => Action::ListDeadLetterSourceQueues,
            Self::PurgeQueue { .. } => Action::PurgeQueue,
            Self::SendMessage { .. } => Action::SendMessage,
            Self::SendMessageBatch { .. } => Action::SendMessageBatch,
            Self::ReceiveMessage { .. } => Action::ReceiveMessage,
            Self::DeleteMessage { .. } => Action::DeleteMessage,
            Self::DeleteMessageBatch { .. } => Action::DeleteMessageBatch,
            Self::ChangeMessageVisibility { .. } => Action::ChangeMessageVisibility,
            Self::ChangeMessageVisibilityBatch { .. } => Action::ChangeMessageVisibilityBatch,
        }
    }
}

//! The public queue operation surface.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::core::batch::{
    BatchOutput, ChangeMessageVisibilityBatchEntry, DeleteMessageBatchEntry,
    SendMessageBatchEntry,
};
use crate::types::attributes::QueueAttributeName;
use crate::types::policy::PermissionAction;
use crate::types::{ReceiveOptions, ReceivedMessage, SendMessageInput, SendMessageOutput};
use crate::Result;

/// Queue service trait. Queues are addressed by URL.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Grant `actions` on a queue to `account_ids` under `label`.
    async fn add_permission(
        &self,
        queue_url: &str,
        label: &str,
        account_ids: Vec<String>,
        actions: Vec<PermissionAction>,
    ) -> Result<()>;

    /// Remove the permission statement with `label`.
    async fn remove_permission(&self, queue_url: &str, label: &str) -> Result<()>;

    /// Create a queue; returns its URL.
    async fn create_queue(&self, name: &str, attributes: HashMap<String, String>)
        -> Result<String>;

    /// Delete a queue. Succeeds for unknown queues.
    async fn delete_queue(&self, queue_url: &str) -> Result<()>;

    /// URL of the queue called `name`.
    async fn get_queue_url(&self, name: &str) -> Result<String>;

    /// Read queue attributes.
    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: Vec<String>,
    ) -> Result<BTreeMap<QueueAttributeName, String>>;

    /// Write queue attributes.
    async fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: HashMap<String, String>,
    ) -> Result<()>;

    /// URLs of queues, optionally filtered by name prefix.
    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>>;

    /// URLs of queues redriving into `queue_url`.
    async fn list_dead_letter_source_queues(&self, queue_url: &str) -> Result<Vec<String>>;

    /// Remove every message of a queue.
    async fn purge_queue(&self, queue_url: &str) -> Result<()>;

    /// Send one message.
    async fn send_message(
        &self,
        queue_url: &str,
        input: SendMessageInput,
    ) -> Result<SendMessageOutput>;

    /// Send up to ten messages.
    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<SendMessageBatchEntry>,
    ) -> Result<BatchOutput<SendMessageOutput>>;

    /// Receive messages, long polling when asked to.
    async fn receive_message(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>>;

    /// Delete the message a receipt handle refers to.
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;

    /// Delete up to ten messages.
    async fn delete_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteMessageBatchEntry>,
    ) -> Result<BatchOutput<()>>;

    /// Reset a delivery's visibility timeout.
    async fn change_message_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        visibility_timeout: u32,
    ) -> Result<()>;

    /// Reset up to ten visibility timeouts.
    async fn change_message_visibility_batch(
        &self,
        queue_url: &str,
        entries: Vec<ChangeMessageVisibilityBatchEntry>,
    ) -> Result<BatchOutput<()>>;
}

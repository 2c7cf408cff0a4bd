//! Operation-level API: action names, requests, responses and dispatch.
//!
//! A wire binding parses its protocol into a [`Request`], calls [`dispatch`]
//! and renders the [`Response`] or an [`ErrorResponse`].

pub mod request;
pub mod response;

use std::fmt;
use std::str::FromStr;

use tracing::{debug, error};

pub use request::Request;
pub use response::{ErrorResponse, Response};

use crate::engine::QueueService;
use crate::metrics;
use crate::Result;

/// Operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Grant permissions.
    AddPermission,
    /// Revoke permissions.
    RemovePermission,
    /// Create a new queue.
    CreateQueue,
    /// Delete a queue.
    DeleteQueue,
    /// Get queue URL from name.
    GetQueueUrl,
    /// Get queue attributes.
    GetQueueAttributes,
    /// Set queue attributes.
    SetQueueAttributes,
    /// List queues.
    ListQueues,
    /// List queues redriving into a queue.
    ListDeadLetterSourceQueues,
    /// Purge queue.
    PurgeQueue,
    /// Send a message.
    SendMessage,
    /// Send multiple messages.
    SendMessageBatch,
    /// Receive messages.
    ReceiveMessage,
    /// Delete a message.
    DeleteMessage,
    /// Delete multiple messages.
    DeleteMessageBatch,
    /// Change message visibility.
    ChangeMessageVisibility,
    /// Change message visibility for multiple messages.
    ChangeMessageVisibilityBatch,
}

impl Action {
    /// Every action.
    pub const ALL: [Action; 17] = [
        Self::AddPermission,
        Self::RemovePermission,
        Self::CreateQueue,
        Self::DeleteQueue,
        Self::GetQueueUrl,
        Self::GetQueueAttributes,
        Self::SetQueueAttributes,
        Self::ListQueues,
        Self::ListDeadLetterSourceQueues,
        Self::PurgeQueue,
        Self::SendMessage,
        Self::SendMessageBatch,
        Self::ReceiveMessage,
        Self::DeleteMessage,
        Self::DeleteMessageBatch,
        Self::ChangeMessageVisibility,
        Self::ChangeMessageVisibilityBatch,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddPermission => "AddPermission",
            Self::RemovePermission => "RemovePermission",
            Self::CreateQueue => "CreateQueue",
            Self::DeleteQueue => "DeleteQueue",
            Self::GetQueueUrl => "GetQueueUrl",
            Self::GetQueueAttributes => "GetQueueAttributes",
            Self::SetQueueAttributes => "SetQueueAttributes",
            Self::ListQueues => "ListQueues",
            Self::ListDeadLetterSourceQueues => "ListDeadLetterSourceQueues",
            Self::PurgeQueue => "PurgeQueue",
            Self::SendMessage => "SendMessage",
            Self::SendMessageBatch => "SendMessageBatch",
            Self::ReceiveMessage => "ReceiveMessage",
            Self::DeleteMessage => "DeleteMessage",
            Self::DeleteMessageBatch => "DeleteMessageBatch",
            Self::ChangeMessageVisibility => "ChangeMessageVisibility",
            Self::ChangeMessageVisibilityBatch => "ChangeMessageVisibilityBatch",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `request` against `service`, recording action metrics.
pub async fn dispatch(service: &dyn QueueService, request: Request) -> Result<Response> {
    let action = request.action();
    let metrics = metrics::get_metrics();
    let timer = metrics
        .action_latency_seconds
        .with_label_values(&[action.as_str()])
        .start_timer();

    let result = route(service, request).await;
    timer.observe_duration();

    let status = match &result {
        Ok(_) => "ok",
        Err(e) if e.is_sender_fault() => {
            debug!(action = %action, code = e.code(), error = %e, "Action rejected");
            "client_error"
        }
        Err(e) => {
            error!(action = %action, error = %e, "Action failed");
            "server_error"
        }
    };
    metrics
        .actions_total
        .with_label_values(&[action.as_str(), status])
        .inc();

    result
}

async fn route(service: &dyn QueueService, request: Request) -> Result<Response> {
    let response = match request {
        Request::AddPermission {
            queue_url,
            label,
            account_ids,
            actions,
        } => {
            service
                .add_permission(&queue_url, &label, account_ids, actions)
                .await?;
            Response::AddPermission
        }
        Request::RemovePermission { queue_url, label } => {
            service.remove_permission(&queue_url, &label).await?;
            Response::RemovePermission
        }
        Request::CreateQueue {
            queue_name,
            attributes,
        } => Response::CreateQueue {
            queue_url: service.create_queue(&queue_name, attributes).await?,
        },
        Request::DeleteQueue { queue_url } => {
            service.delete_queue(&queue_url).await?;
            Response::DeleteQueue
        }
        Request::GetQueueUrl { queue_name } => Response::GetQueueUrl {
            queue_url: service.get_queue_url(&queue_name).await?,
        },
        Request::GetQueueAttributes {
            queue_url,
            attribute_names,
        } => Response::GetQueueAttributes {
            attributes: service
                .get_queue_attributes(&queue_url, attribute_names)
                .await?,
        },
        Request::SetQueueAttributes {
            queue_url,
            attributes,
        } => {
            service.set_queue_attributes(&queue_url, attributes).await?;
            Response::SetQueueAttributes
        }
        Request::ListQueues { queue_name_prefix } => Response::ListQueues {
            queue_urls: service.list_queues(queue_name_prefix.as_deref()).await?,
        },
        Request::ListDeadLetterSourceQueues { queue_url } => {
            Response::ListDeadLetterSourceQueues {
                queue_urls: service.list_dead_letter_source_queues(&queue_url).await?,
            }
        }
        Request::PurgeQueue { queue_url } => {
            service.purge_queue(&queue_url).await?;
            Response::PurgeQueue
        }
        Request::SendMessage { queue_url, input } => {
            Response::SendMessage(service.send_message(&queue_url, input).await?)
        }
        Request::SendMessageBatch { queue_url, entries } => {
            Response::SendMessageBatch(service.send_message_batch(&queue_url, entries).await?)
        }
        Request::ReceiveMessage { queue_url, options } => Response::ReceiveMessage {
            messages: service.receive_message(&queue_url, options).await?,
        },
        Request::DeleteMessage {
            queue_url,
            receipt_handle,
        } => {
            service.delete_message(&queue_url, &receipt_handle).await?;
            Response::DeleteMessage
        }
        Request::DeleteMessageBatch { queue_url, entries } => {
            Response::DeleteMessageBatch(service.delete_message_batch(&queue_url, entries).await?)
        }
        Request::ChangeMessageVisibility {
            queue_url,
            receipt_handle,
            visibility_timeout,
        } => {
            service
                .change_message_visibility(&queue_url, &receipt_handle, visibility_timeout)
                .await?;
            Response::ChangeMessageVisibility
        }
        Request::ChangeMessageVisibilityBatch { queue_url, entries } => {
            Response::ChangeMessageVisibilityBatch(
                service
                    .change_message_visibility_batch(&queue_url, entries)
                    .await?,
            )
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_roundtrip() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("TagQueue".parse::<Action>().is_err());
        assert_eq!(Action::SendMessageBatch.to_string(), "SendMessageBatch");
    }
}

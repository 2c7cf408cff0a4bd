// Request routing through the operation-level API.
use std::collections::HashMap;

use siloq::api::{dispatch, Action, ErrorResponse, Request, Response};
use siloq::config::EngineConfig;
use siloq::core::batch::SendMessageBatchEntry;
use siloq::types::{ReceiveOptions, SendMessageInput};
use siloq::Engine;

async fn create(engine: &Engine, name: &str) -> String {
    let response = dispatch(
        engine,
        Request::CreateQueue {
            queue_name: name.to_string(),
            attributes: HashMap::new(),
        },
    )
    .await
    .unwrap();

    match response {
        Response::CreateQueue { queue_url } => queue_url,
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatch_send_receive_delete() {
    let engine = Engine::new(EngineConfig::default());
    let queue_url = create(&engine, "dispatch").await;

    let sent = dispatch(
        &engine,
        Request::SendMessage {
            queue_url: queue_url.clone(),
            input: SendMessageInput::new("routed"),
        },
    )
    .await
    .unwrap();
    assert_eq!(sent.action(), Action::SendMessage);

    let received = dispatch(
        &engine,
        Request::ReceiveMessage {
            queue_url: queue_url.clone(),
            options: ReceiveOptions::max(1),
        },
    )
    .await
    .unwrap();
    let receipt_handle = match received {
        Response::ReceiveMessage { messages } => {
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].body, "routed");
            messages[0].receipt_handle.clone()
        }
        other => panic!("unexpected response: {:?}", other),
    };

    let deleted = dispatch(
        &engine,
        Request::DeleteMessage {
            queue_url,
            receipt_handle,
        },
    )
    .await
    .unwrap();
    assert!(matches!(deleted, Response::DeleteMessage));
}

#[tokio::test]
async fn test_dispatch_batch_returns_entry_results() {
    let engine = Engine::new(EngineConfig::default());
    let queue_url = create(&engine, "dispatch-batch").await;

    let response = dispatch(
        &engine,
        Request::SendMessageBatch {
            queue_url,
            entries: vec![
                SendMessageBatchEntry {
                    id: "good".to_string(),
                    input: SendMessageInput::new("fine"),
                },
                SendMessageBatchEntry {
                    id: "bad".to_string(),
                    input: SendMessageInput::new("\u{0}"),
                },
            ],
        },
    )
    .await
    .unwrap();

    match response {
        Response::SendMessageBatch(output) => {
            assert_eq!(output.successful.len(), 1);
            assert_eq!(output.successful[0].id, "good");
            assert_eq!(output.failed.len(), 1);
            assert_eq!(output.failed[0].code, "InvalidMessageContents");
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatch_error_maps_to_envelope() {
    let engine = Engine::new(EngineConfig::default());

    let err = dispatch(
        &engine,
        Request::GetQueueUrl {
            queue_name: "missing".to_string(),
        },
    )
    .await
    .unwrap_err();

    let envelope = ErrorResponse::from(&err);
    assert_eq!(envelope.code, "AWS.SimpleQueueService.NonExistentQueue");
    assert!(envelope.sender_fault);
}

#[tokio::test]
async fn test_dispatch_list_and_attributes() {
    let engine = Engine::new(EngineConfig::default());
    let queue_url = create(&engine, "listed").await;

    let listed = dispatch(
        &engine,
        Request::ListQueues {
            queue_name_prefix: Some("list".to_string()),
        },
    )
    .await
    .unwrap();
    match listed {
        Response::ListQueues { queue_urls } => assert_eq!(queue_urls, vec![queue_url.clone()]),
        other => panic!("unexpected response: {:?}", other),
    }

    let attributes = dispatch(
        &engine,
        Request::GetQueueAttributes {
            queue_url,
            attribute_names: vec!["All".to_string()],
        },
    )
    .await
    .unwrap();
    match attributes {
        Response::GetQueueAttributes { attributes } => {
            assert!(attributes.len() >= 10);
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

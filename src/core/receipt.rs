//! Receipt handle generation and parsing.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::MessageId;
use crate::{Error, Result};

/// Receipt handle data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptHandleData {
    /// Queue name.
    pub queue: String,
    /// Message ID.
    pub message_id: MessageId,
    /// Delivery epoch; only the latest delivery's epoch is accepted.
    pub epoch: u64,
    /// Nonce so equal (queue, message, epoch) triples never share a token.
    pub nonce: String,
}

/// Generate a receipt handle for one delivery of a message.
pub fn generate_receipt_handle(queue: &str, message_id: &MessageId, epoch: u64) -> String {
    let data = ReceiptHandleData {
        queue: queue.to_string(),
        message_id: message_id.clone(),
        epoch,
        nonce: Uuid::new_v4().simple().to_string(),
    };

    let json = serde_json::to_vec(&data).unwrap_or_default();
    STANDARD.encode(json)
}

/// Parse a receipt handle and extract the data.
pub fn parse_receipt_handle(receipt_handle: &str) -> Result<ReceiptHandleData> {
    let decoded = STANDARD
        .decode(receipt_handle)
        .map_err(|_| Error::ReceiptHandleIsInvalid)?;

    serde_json::from_slice(&decoded).map_err(|_| Error::ReceiptHandleIsInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_handle_roundtrip() {
        let message_id = MessageId::new();

        let handle = generate_receipt_handle("orders", &message_id, 7);
        let parsed = parse_receipt_handle(&handle).unwrap();

        assert_eq!(parsed.queue, "orders");
        assert_eq!(parsed.message_id, message_id);
        assert_eq!(parsed.epoch, 7);
        assert!(!parsed.nonce.is_empty());
    }

    #[test]
    fn test_handles_are_unique_per_delivery() {
        let message_id = MessageId::new();
        let a = generate_receipt_handle("orders", &message_id, 1);
        let b = generate_receipt_handle("orders", &message_id, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_invalid_receipt_handle() {
        assert!(matches!(
            parse_receipt_handle("invalid"),
            Err(Error::ReceiptHandleIsInvalid)
        ));
        assert!(parse_receipt_handle("").is_err());
        assert!(parse_receipt_handle(&STANDARD.encode(b"{\"queue\":1}")).is_err());
    }
}

//! Batch request envelopes.
//!
//! A batch is validated as a whole first (entry count, id syntax, id
//! uniqueness). Once it passes, each entry runs as an independent operation
//! and lands in either the successful or the failed list of a
//! [`BatchOutput`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::validation::{validate_batch_entry_id, MAX_BATCH_PAYLOAD};
use crate::types::SendMessageInput;
use crate::{Error, Result};

/// Maximum entries in one batch request.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// Anything carrying a caller-chosen batch entry id.
pub trait BatchEntry {
    /// Entry id.
    fn id(&self) -> &str;
}

/// One message of a `SendMessageBatch`.
#[derive(Debug, Clone)]
pub struct SendMessageBatchEntry {
    /// Entry id.
    pub id: String,
    /// Message to send.
    pub input: SendMessageInput,
}

/// One receipt handle of a `DeleteMessageBatch`.
#[derive(Debug, Clone)]
pub struct DeleteMessageBatchEntry {
    /// Entry id.
    pub id: String,
    /// Receipt handle to delete.
    pub receipt_handle: String,
}

/// One entry of a `ChangeMessageVisibilityBatch`.
#[derive(Debug, Clone)]
pub struct ChangeMessageVisibilityBatchEntry {
    /// Entry id.
    pub id: String,
    /// Receipt handle to change.
    pub receipt_handle: String,
    /// New timeout in seconds.
    pub visibility_timeout: u32,
}

impl BatchEntry for SendMessageBatchEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl BatchEntry for DeleteMessageBatchEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl BatchEntry for ChangeMessageVisibilityBatchEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A successful batch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultEntry<T> {
    /// Entry id.
    pub id: String,
    /// Per-entry result.
    pub result: T,
}

/// A failed batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResultErrorEntry {
    /// Entry id.
    pub id: String,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Whether the caller caused the failure.
    pub sender_fault: bool,
}

impl BatchResultErrorEntry {
    /// Failure entry for `id` from `error`.
    pub fn from_error(id: impl Into<String>, error: &Error) -> Self {
        Self {
            id: id.into(),
            code: error.code().to_string(),
            message: error.to_string(),
            sender_fault: error.is_sender_fault(),
        }
    }
}

/// Per-entry outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput<T> {
    /// Entries that succeeded, in request order.
    pub successful: Vec<BatchResultEntry<T>>,
    /// Entries that failed, in request order.
    pub failed: Vec<BatchResultErrorEntry>,
}

impl<T> Default for BatchOutput<T> {
    fn default() -> Self {
        Self {
            successful: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchOutput<T> {
    /// Record the outcome of entry `id`.
    pub fn record(&mut self, id: &str, outcome: Result<T>) {
        match outcome {
            Ok(result) => self.successful.push(BatchResultEntry {
                id: id.to_string(),
                result,
            }),
            Err(e) => self.failed.push(BatchResultErrorEntry::from_error(id, &e)),
        }
    }

    /// Total entries recorded.
    pub fn len(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batch-level checks: non-empty, at most ten entries, valid and distinct ids.
pub fn validate_entries<E: BatchEntry>(entries: &[E]) -> Result<()> {
    if entries.is_empty() {
        return Err(ValidationError::EmptyBatchRequest.into());
    }
    if entries.len() > MAX_BATCH_ENTRIES {
        return Err(ValidationError::TooManyEntriesInBatchRequest {
            count: entries.len(),
            max: MAX_BATCH_ENTRIES,
        }
        .into());
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        validate_batch_entry_id(entry.id())?;
        if !seen.insert(entry.id()) {
            return Err(ValidationError::BatchEntryIdsNotDistinct(entry.id().to_string()).into());
        }
    }
    Ok(())
}

/// The summed payload of a send batch must fit in one message.
pub fn validate_send_batch_size(entries: &[SendMessageBatchEntry]) -> Result<()> {
    let size: usize = entries.iter().map(|e| e.input.payload_size()).sum();
    if size > MAX_BATCH_PAYLOAD {
        return Err(ValidationError::BatchRequestTooLong {
            size,
            max: MAX_BATCH_PAYLOAD,
        }
        .into());
    }
    Ok(())
}

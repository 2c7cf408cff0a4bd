//! Queue engine building blocks: time, timers, receipts, visibility, redrive and batches.

pub mod batch;
pub mod cleanup;
pub mod clock;
pub mod dlq;
pub mod receipt;
pub mod timer;
pub mod visibility;

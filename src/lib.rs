//! # siloq
//!
//! An in-process message queue engine with SQS semantics: queue lifecycle,
//! at-least-once delivery with receipt-scoped visibility timeouts, delayed
//! delivery, batch operations with per-entry results and dead-letter redrive.
//!
//! Use [`engine::Engine`] directly through the [`engine::QueueService`] trait,
//! or route [`api::Request`]s through [`api::dispatch`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod storage;
pub mod types;

pub use engine::{Engine, QueueService};
pub use error::{Error, Result};

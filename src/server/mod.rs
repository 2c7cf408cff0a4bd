//! HTTP endpoints and process lifecycle.

/// Metrics and health HTTP server
pub mod metrics;

/// Graceful shutdown handling
pub mod shutdown;

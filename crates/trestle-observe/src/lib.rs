//! Observability for Trestle services.
//!
//! Structured logging through `tracing`, with optional OpenTelemetry span
//! export for local development.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};

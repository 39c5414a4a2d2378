#![deny(missing_docs)]

//! Core library for the student records API.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Request counters.
pub mod metrics;
/// In-memory student record store.
pub mod store;
/// Profile summaries via a streaming text-generation service.
pub mod summary;

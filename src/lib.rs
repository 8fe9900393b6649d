#![deny(missing_docs)]

//! Core library for the AskDoc summarization server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Transcript extraction from uploads and pasted text.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Email delivery through an SMTP relay.
pub mod notification;
/// Summarization requests against the Gemini API.
pub mod summarization;

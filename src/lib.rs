#![deny(missing_docs)]

//! Core library for the document intake service.

/// HTTP routing and REST handlers.
pub mod api;
/// Session-scoped memoization helpers.
pub mod cache;
/// Token-bounded and retrieval chunking.
pub mod chunking;
/// Document-type taxonomy and the classifier.
pub mod classification;
/// Completion client abstraction and adapters.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Text extraction from uploaded files and archives.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Intake metrics helpers.
pub mod metrics;
/// Embeddings, vector index and conversational retrieval.
pub mod retrieval;
/// Intake commands shared by every surface.
pub mod service;
/// Per-session documents and derived state.
pub mod session;
/// Type-aware summaries and deadline extraction.
pub mod summarization;

//! Chunked summarization and deadline extraction.
//!
//! Both pipelines share the same shape: split the document into token-bounded chunks, issue one
//! completion per chunk in order, then reduce. Summaries reduce through a final synthesis call
//! under a type-specific template; deadlines reduce by filtering, deduplicating and capping the
//! per-chunk bullet lists.

mod deadlines;
pub mod prompts;
mod summarizer;

use crate::chunking::ChunkingError;
use crate::completion::CompletionError;
use thiserror::Error;

pub use deadlines::{DeadlineExtractor, DeadlineReport, MAX_DEADLINES, filter_deadline_lines};
pub use summarizer::{EMPTY_TEXT_NOTICE, Summarizer};

/// Errors surfaced by summarization and deadline extraction.
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// The document could not be split into chunks.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// A completion call failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl SummarizationError {
    /// Whether the failure is a missing-credentials problem.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Completion(error) if error.is_configuration())
    }
}

//! Error taxonomy and response views of the intake service.

use crate::chunking::ChunkingError;
use crate::completion::CompletionError;
use crate::config::ConfigError;
use crate::extraction::ExtractionError;
use crate::retrieval::RetrievalError;
use crate::session::SessionError;
use crate::summarization::SummarizationError;
use serde::Serialize;
use thiserror::Error;

/// Errors emitted by intake commands.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Tokenizer setup or chunk sizing failed.
    #[error("Failed to prepare tokenizer: {0}")]
    Chunking(#[from] ChunkingError),
    /// A classification call failed.
    #[error("Classification failed: {0}")]
    Classification(#[from] CompletionError),
    /// Summary or deadline generation failed.
    #[error("Summarization failed: {0}")]
    Summarization(#[from] SummarizationError),
    /// Indexing or answering a chat question failed.
    #[error("Chat failed: {0}")]
    Retrieval(#[from] RetrievalError),
    /// An uploaded archive could not be expanded.
    #[error("Failed to read upload: {0}")]
    Upload(#[from] ExtractionError),
    /// The command referenced missing or locked session state.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Coarse failure category used by outer surfaces to pick status codes and exit paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credentials or invalid settings.
    Configuration,
    /// The completion or embedding provider failed.
    ExternalService,
    /// A named document does not exist.
    NotFound,
    /// The session state forbids the transition.
    Conflict,
    /// The input could not be processed.
    InvalidInput,
}

impl IntakeError {
    /// Category of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Chunking(_) => ErrorKind::Configuration,
            Self::Classification(error) if error.is_configuration() => ErrorKind::Configuration,
            Self::Summarization(error) if error.is_configuration() => ErrorKind::Configuration,
            Self::Retrieval(error) if error.is_configuration() => ErrorKind::Configuration,
            Self::Summarization(SummarizationError::Chunking(_))
            | Self::Retrieval(RetrievalError::Chunking(_)) => ErrorKind::Configuration,
            Self::Classification(_) | Self::Summarization(_) | Self::Retrieval(_) => {
                ErrorKind::ExternalService
            }
            Self::Session(SessionError::UnknownDocument(_)) => ErrorKind::NotFound,
            Self::Session(SessionError::NotClassified(_))
            | Self::Session(SessionError::ClassificationLocked(_)) => ErrorKind::Conflict,
            Self::Session(SessionError::Extraction { .. })
            | Self::Upload(_)
            | Self::InvalidRequest(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Result of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// Documents added to the session, in order.
    pub added: Vec<String>,
    /// Names already present in the session; their first content was kept.
    pub skipped: Vec<String>,
}

/// Summary of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    /// Document name.
    pub name: String,
    /// Structured summary text.
    pub summary: String,
}

/// Deadlines of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDeadlines {
    /// Document name.
    pub name: String,
    /// `event: date` lines, at most ten.
    pub deadlines: Vec<String>,
}

/// Answer to a chat question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatAnswer {
    /// Model answer.
    pub answer: String,
}

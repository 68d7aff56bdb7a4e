//! Retrieval-augmented chat: embeddings, an in-memory vector index and the conversational loop.

mod chat;
/// Embedding clients that turn text into vectors.
pub mod embedding;
mod index;

use crate::chunking::ChunkingError;
use crate::completion::CompletionError;
use thiserror::Error;

pub use chat::{ChatTurn, ConversationalChat};
pub use embedding::{
    EmbeddingClient, EmbeddingError, HashingEmbeddingClient, OpenAiEmbeddingClient,
    embedding_client_from_config,
};
pub use index::{VectorIndex, cosine_similarity};

/// Errors surfaced while indexing documents or answering questions.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The documents could not be split into windows.
    #[error("Failed to split documents: {0}")]
    Chunking(#[from] ChunkingError),
    /// The embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// The completion provider failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// The provider returned a different number of vectors than texts sent.
    #[error("expected {chunks} embeddings, received {vectors}")]
    IndexMismatch {
        /// Texts sent for embedding.
        chunks: usize,
        /// Vectors received.
        vectors: usize,
    },
}

impl RetrievalError {
    /// Whether the failure is a missing-credentials problem.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Embedding(error) => error.is_configuration(),
            Self::Completion(error) => error.is_configuration(),
            _ => false,
        }
    }
}

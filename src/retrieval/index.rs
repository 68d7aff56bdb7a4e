use crate::chunking::split_for_retrieval;
use crate::retrieval::RetrievalError;
use crate::retrieval::embedding::EmbeddingClient;

/// In-memory vector index over overlapping text windows.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Join `texts` with blank lines, split into overlapping windows and embed every window.
    pub async fn build(
        embeddings: &dyn EmbeddingClient,
        texts: &[String],
        window: usize,
        overlap: usize,
    ) -> Result<Self, RetrievalError> {
        let chunks = split_for_retrieval(&texts.join("\n\n"), window, overlap)?;
        if chunks.is_empty() {
            return Ok(Self::default());
        }
        let vectors = embeddings.generate_embeddings(chunks.clone()).await?;
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::IndexMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        tracing::info!(chunks = chunks.len(), window, overlap, "Built chat index");
        Ok(Self { chunks, vectors })
    }

    /// Number of indexed windows.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no windows.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `k` windows most similar to `query`, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<&str> {
        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (cosine_similarity(query, vector), position))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(k)
            .map(|(_, position)| self.chunks[position].as_str())
            .collect()
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

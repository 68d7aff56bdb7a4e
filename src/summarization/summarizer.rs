//! Map-reduce summaries: one partial summary per token chunk, then one final synthesis.

use crate::chunking::{Tokenizer, chunk_text};
use crate::classification::DocumentType;
use crate::completion::{CompletionClient, CompletionRequest};
use crate::summarization::SummarizationError;
use crate::summarization::prompts::{
    combined_final_prompt, partial_summary_prompt, single_final_prompt, template_for,
};
use std::sync::Arc;

/// Returned instead of a summary when a document has no extracted text.
pub const EMPTY_TEXT_NOTICE: &str = "⚠️ Texto vazio ou não extraído para este documento.";

const PARTIAL_TEMPERATURE: f32 = 0.2;
const PARTIAL_MAX_TOKENS: u32 = 1000;
const FINAL_TEMPERATURE: f32 = 0.1;
const FINAL_MAX_TOKENS: u32 = 1500;

/// Produces type-specific structured summaries of arbitrarily long documents.
#[derive(Clone)]
pub struct Summarizer {
    client: Arc<dyn CompletionClient>,
    tokenizer: Arc<dyn Tokenizer>,
    model: String,
    chunk_tokens: usize,
}

impl Summarizer {
    /// Build a summarizer that splits documents into runs of `chunk_tokens` tokens.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        tokenizer: Arc<dyn Tokenizer>,
        model: impl Into<String>,
        chunk_tokens: usize,
    ) -> Self {
        Self {
            client,
            tokenizer,
            model: model.into(),
            chunk_tokens,
        }
    }

    /// Summarize `text` using the template registered for `document_type`.
    ///
    /// Calls run sequentially in chunk order; the first failure aborts the summary.
    pub async fn summarize(
        &self,
        text: &str,
        document_type: &DocumentType,
    ) -> Result<String, SummarizationError> {
        if text.trim().is_empty() {
            return Ok(EMPTY_TEXT_NOTICE.to_string());
        }

        let chunks = chunk_text(text, self.chunk_tokens, self.tokenizer.as_ref())?;
        tracing::info!(
            document_type = %document_type,
            chunks = chunks.len(),
            chunk_tokens = self.chunk_tokens,
            "Summarizing document"
        );

        let mut partials = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let request = CompletionRequest::user_prompt(&self.model, partial_summary_prompt(chunk))
                .with_temperature(PARTIAL_TEMPERATURE)
                .with_max_output_tokens(PARTIAL_MAX_TOKENS);
            let partial = self.client.complete(request).await?;
            tracing::debug!(chunk = index + 1, chars = partial.len(), "Partial summary ready");
            partials.push(partial);
        }

        let template = template_for(document_type);
        let prompt = match partials.as_slice() {
            [single] => single_final_prompt(template, single),
            many => combined_final_prompt(template, many),
        };
        let request = CompletionRequest::user_prompt(&self.model, prompt)
            .with_temperature(FINAL_TEMPERATURE)
            .with_max_output_tokens(FINAL_MAX_TOKENS);
        let summary = self.client.complete(request).await?;
        Ok(summary.trim().to_string())
    }
}

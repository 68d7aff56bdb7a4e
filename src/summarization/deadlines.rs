//! Deadline extraction: bullet lines of the form `event: date`, at most ten per document.

use crate::chunking::{Tokenizer, chunk_text};
use crate::completion::{CompletionClient, CompletionRequest};
use crate::summarization::SummarizationError;
use crate::summarization::prompts::deadline_prompt;
use std::collections::HashSet;
use std::sync::Arc;

/// Upper bound on deadlines reported per document (and kept per chunk response).
pub const MAX_DEADLINES: usize = 10;

const DEADLINE_TEMPERATURE: f32 = 0.2;
const BULLET_MARKERS: [char; 3] = ['-', '•', '–'];
const EXCLUDED_PHRASES: [&str; 2] = ["não especificado", "ver cláusula"];

/// Outcome of extracting deadlines from one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeadlineReport {
    /// Unique deadline lines in chunk order, including inline chunk errors.
    pub deadlines: Vec<String>,
    /// Whether any chunk failed and was replaced by an error line.
    pub had_failures: bool,
}

/// Extracts actionable deadlines from a document's text.
#[derive(Clone)]
pub struct DeadlineExtractor {
    client: Arc<dyn CompletionClient>,
    tokenizer: Arc<dyn Tokenizer>,
    model: String,
    split_threshold: usize,
    chunk_tokens: usize,
}

impl DeadlineExtractor {
    /// Documents longer than `split_threshold` tokens are split into `chunk_tokens` runs.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        tokenizer: Arc<dyn Tokenizer>,
        model: impl Into<String>,
        split_threshold: usize,
        chunk_tokens: usize,
    ) -> Self {
        Self {
            client,
            tokenizer,
            model: model.into(),
            split_threshold,
            chunk_tokens,
        }
    }

    /// Extract up to [`MAX_DEADLINES`] unique deadline lines, in chunk order.
    ///
    /// A failing chunk contributes an `Erro ao processar parte {n}: ...` line and the remaining
    /// chunks still run, and the report is flagged with `had_failures`. Configuration errors
    /// are returned instead.
    pub async fn extract(&self, text: &str) -> Result<DeadlineReport, SummarizationError> {
        if text.trim().is_empty() {
            return Ok(DeadlineReport::default());
        }

        let token_count = self.tokenizer.count(text);
        let parts = if token_count > self.split_threshold {
            chunk_text(text, self.chunk_tokens, self.tokenizer.as_ref())?
        } else {
            vec![text.to_string()]
        };
        tracing::info!(tokens = token_count, parts = parts.len(), "Extracting deadlines");

        let mut collected = Vec::new();
        let mut had_failures = false;
        for (index, part) in parts.iter().enumerate() {
            let request = CompletionRequest::user_prompt(&self.model, deadline_prompt(part))
                .with_temperature(DEADLINE_TEMPERATURE);
            match self.client.complete(request).await {
                Ok(response) => collected.extend(filter_deadline_lines(&response)),
                Err(error) if error.is_configuration() => return Err(error.into()),
                Err(error) => {
                    tracing::warn!(part = index + 1, error = %error, "Deadline extraction failed for part");
                    collected.push(format!("Erro ao processar parte {}: {error}", index + 1));
                    had_failures = true;
                }
            }
        }

        let mut seen = HashSet::new();
        collected.retain(|line| seen.insert(line.clone()));
        collected.truncate(MAX_DEADLINES);
        Ok(DeadlineReport {
            deadlines: collected,
            had_failures,
        })
    }
}

/// Keep the bullet lines of a model response that state an `event: date` pair.
///
/// Only the first [`MAX_DEADLINES`] bullets are considered. Markers are stripped, and lines
/// deferring to another clause or marked unspecified are dropped.
pub fn filter_deadline_lines(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(BULLET_MARKERS))
        .take(MAX_DEADLINES)
        .map(|line| {
            line.trim_matches(|c: char| c == ' ' || BULLET_MARKERS.contains(&c))
                .trim()
                .to_string()
        })
        .filter(|line| {
            let lowered = line.to_lowercase();
            !EXCLUDED_PHRASES
                .iter()
                .any(|phrase| lowered.contains(phrase))
        })
        .filter(|line| line.contains(':'))
        .collect()
}

//! Token-bounded chunking for model calls and overlapping windows for the chat index.
//!
//! Two splitters live here:
//!
//! - [`chunk_text`]: non-overlapping token runs under a [`Tokenizer`]. Used by summarization and
//!   deadline extraction, where every token of the document must reach exactly one model call.
//! - [`split_for_retrieval`]: semantic windows with a sliding overlap, measured in characters,
//!   feeding the chat index. Neighbouring windows share context so answers spanning a boundary
//!   stay retrievable.
//!
//! Token counting prefers `tiktoken-rs` encodings resolved from the model name and falls back to
//! `cl100k_base` for unknown models.

use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// A chunk end may move back this many tokens to land on a character boundary.
const MAX_BOUNDARY_BACKOFF: usize = 3;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller requested an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Reversible text ↔ token mapping used to bound chunk sizes.
pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode a run of tokens; `None` when the run does not form valid UTF-8.
    fn decode(&self, tokens: &[u32]) -> Option<String>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Decode a run, replacing undecodable tokens with U+FFFD.
    fn decode_lossy(&self, tokens: &[u32]) -> String {
        if let Some(text) = self.decode(tokens) {
            return text;
        }
        tokens
            .iter()
            .map(|token| {
                self.decode(std::slice::from_ref(token))
                    .unwrap_or_else(|| char::REPLACEMENT_CHARACTER.to_string())
            })
            .collect()
    }
}

/// `tiktoken` byte-pair encoder resolved from a model or encoding name.
pub struct BpeTokenizer {
    model: String,
    encoding: Arc<CoreBPE>,
}

impl BpeTokenizer {
    /// Resolve the encoding used by `model`, falling back to `cl100k_base`.
    pub fn for_model(model: &str) -> Result<Self, ChunkingError> {
        let normalized = model.trim();
        let target = if normalized.is_empty() {
            "cl100k_base"
        } else {
            normalized
        };
        let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
            model: target.to_string(),
            source,
        })?;
        Ok(Self {
            model: target.to_string(),
            encoding: Arc::new(encoding),
        })
    }

    /// Model or encoding name this tokenizer was resolved from.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.encoding
            .encode_ordinary(text)
            .into_iter()
            .map(|token| token as u32)
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> Option<String> {
        self.encoding
            .decode(tokens.iter().map(|&token| token as _).collect())
            .ok()
    }
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::warn!(
                    model,
                    "Falling back to 'cl100k_base' encoding for token counting"
                );
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

/// A decoded run of consecutive tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChunk {
    /// Position of the run within the document's token stream.
    pub tokens: Range<usize>,
    /// Decoded text of the run.
    pub text: String,
}

impl TokenChunk {
    /// Number of tokens in the run.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Split `text` into consecutive runs of at most `max_tokens` tokens, decoded back to text.
///
/// Runs never overlap and together cover the whole token stream. Empty text yields no chunks.
pub fn chunk_text(
    text: &str,
    max_tokens: usize,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<String>, ChunkingError> {
    Ok(chunk_tokens(text, max_tokens, tokenizer)?
        .into_iter()
        .map(|chunk| chunk.text)
        .collect())
}

/// Like [`chunk_text`] but keeps the token range of every run.
///
/// When a run boundary would cut a multi-byte character in half, the boundary moves back by up
/// to `MAX_BOUNDARY_BACKOFF` tokens; runs only ever shrink, never exceed the budget.
pub fn chunk_tokens(
    text: &str,
    max_tokens: usize,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<TokenChunk>, ChunkingError> {
    if max_tokens == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let tokens = tokenizer.encode(text);
    let mut chunks = Vec::with_capacity(tokens.len().div_ceil(max_tokens));
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + max_tokens).min(tokens.len());
        let (cut, decoded) = decodable_cut(&tokens, start, end, tokenizer);
        chunks.push(TokenChunk {
            tokens: start..cut,
            text: decoded,
        });
        start = cut;
    }

    tracing::trace!(
        tokens = tokens.len(),
        chunks = chunks.len(),
        max_tokens,
        "Chunked text"
    );
    Ok(chunks)
}

fn decodable_cut(
    tokens: &[u32],
    start: usize,
    end: usize,
    tokenizer: &dyn Tokenizer,
) -> (usize, String) {
    let floor = end.saturating_sub(MAX_BOUNDARY_BACKOFF).max(start + 1);
    let mut cut = end;
    while cut >= floor {
        if let Some(decoded) = tokenizer.decode(&tokens[start..cut]) {
            return (cut, decoded);
        }
        cut -= 1;
    }
    (end, tokenizer.decode_lossy(&tokens[start..end]))
}

/// Split text into overlapping windows for the chat index.
///
/// `window` and `overlap` are measured in characters. Whitespace-only input yields no windows.
pub fn split_for_retrieval(
    text: &str,
    window: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if window == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let effective_overlap = overlap.min(window.saturating_sub(1));
    let base_size = window - effective_overlap;
    let counter = character_counter();
    let base_chunks = semantic_chunks(text, base_size, counter.clone());
    Ok(apply_overlap(base_chunks, window, effective_overlap, &counter))
}

fn character_counter() -> TokenCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

/// Semantic split (paragraphs, sentences, words) bounded by `chunk_size` under `token_counter`.
fn semantic_chunks(text: &str, chunk_size: usize, token_counter: TokenCounter) -> Vec<String> {
    let chunker = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| token_counter.as_ref()(segment)),
    );
    chunker.chunk(text)
}

/// Prefix every window with the tail of its predecessor, trimmed back under `chunk_size`.
fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    if effective_overlap == 0 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut iter = chunks.into_iter();
    let Some(mut previous) = iter.next() else {
        return overlapped;
    };
    overlapped.push(previous.clone());

    for current in iter {
        let overlapped_chunk = build_overlapped_chunk(
            &previous,
            &current,
            effective_overlap,
            chunk_size,
            token_counter,
        );
        overlapped.push(overlapped_chunk);
        previous = current;
    }

    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    token_counter: &TokenCounter,
) -> String {
    let tail = tail_with_limit(previous, overlap, token_counter);
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);

    if !tail.is_empty() {
        combined.push_str(tail);
        if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
            combined.push(' ');
        }
    }

    combined.push_str(current);
    trim_front_to_limit(&combined, chunk_size, token_counter).to_string()
}

fn tail_with_limit<'a>(text: &'a str, limit: usize, token_counter: &TokenCounter) -> &'a str {
    trim_front_to_limit(text.trim_start(), limit, token_counter)
}

/// Drop leading characters until the remainder fits within `limit`.
fn trim_front_to_limit<'a>(text: &'a str, limit: usize, token_counter: &TokenCounter) -> &'a str {
    if limit == 0 {
        return "";
    }
    if token_counter.as_ref()(text) <= limit {
        return text;
    }

    for (offset, _) in text.char_indices().skip(1) {
        let trimmed = text[offset..].trim_start();
        if token_counter.as_ref()(trimmed) <= limit {
            return trimmed;
        }
    }

    ""
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}


#[cfg(test)]
mod tests {
    use super::testing::{ByteTokenizer, CharTokenizer};
    use super::*;

    #[test]
    fn chunk_text_of_empty_input_is_empty() {
        let chunks = chunk_text("", 5, &CharTokenizer).expect("chunks");
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunk_text_rejects_zero_budget() {
        let error = chunk_text("abc", 0, &CharTokenizer).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn chunks_cover_token_stream_without_overlap() {
        let text = "Cláusula primeira: o prazo de vigência é de doze meses.";
        for budget in [1, 3, 7, 16, 200] {
            let chunks = chunk_tokens(text, budget, &CharTokenizer).expect("chunks");
            let mut expected_start = 0;
            let mut rebuilt = Vec::new();
            for chunk in &chunks {
                assert_eq!(chunk.tokens.start, expected_start);
                assert!(chunk.token_count() <= budget);
                assert!(chunk.token_count() > 0);
                expected_start = chunk.tokens.end;
                rebuilt.extend(CharTokenizer.encode(&chunk.text));
            }
            assert_eq!(rebuilt, CharTokenizer.encode(text));
        }
    }

    #[test]
    fn multibyte_boundaries_move_back_instead_of_splitting_characters() {
        // ç and ã take two bytes each.
        let text = "ação";
        let chunks = chunk_tokens(text, 2, &ByteTokenizer).expect("chunks");
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts.concat(), text);
        for chunk in &chunks {
            assert!(chunk.token_count() <= 2);
        }
        assert_eq!(texts, vec!["a", "ç", "ã", "o"]);
    }

    #[test]
    fn bpe_tokenizer_round_trips_chunks() {
        let tokenizer = BpeTokenizer::for_model("gpt-3.5-turbo").expect("tokenizer");
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let chunks = chunk_tokens(&text, 17, &tokenizer).expect("chunks");
        assert!(chunks.len() > 1);
        let rebuilt: String = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(rebuilt, text);
        let total: usize = chunks.iter().map(TokenChunk::token_count).sum();
        assert_eq!(total, tokenizer.count(&text));
    }

    #[test]
    fn unknown_models_fall_back_to_cl100k() {
        let tokenizer = BpeTokenizer::for_model("some-local-model").expect("fallback");
        assert_eq!(tokenizer.model(), "some-local-model");
        assert!(tokenizer.count("hello world") >= 2);
    }

    #[test]
    fn retrieval_windows_respect_size_and_overlap() {
        let text = "one two three four five six seven eight nine ten";
        let windows = split_for_retrieval(text, 14, 4).expect("windows");
        assert!(windows.len() > 1);
        for window in &windows {
            assert!(window.chars().count() <= 14, "window too long: {window:?}");
        }
        assert!(
            windows
                .windows(2)
                .any(|pair| starts_with_suffix_of(&pair[1], &pair[0])),
            "no window carries context from its predecessor: {windows:?}"
        );
        for word in text.split_whitespace() {
            assert!(windows.iter().any(|window| window.contains(word)));
        }
    }

    fn starts_with_suffix_of(next: &str, previous: &str) -> bool {
        previous
            .char_indices()
            .map(|(offset, _)| &previous[offset..])
            .any(|suffix| !suffix.trim().is_empty() && next.starts_with(suffix))
    }

    #[test]
    fn retrieval_split_of_blank_text_is_empty() {
        assert!(split_for_retrieval("  \n ", 10, 2).expect("windows").is_empty());
    }
}

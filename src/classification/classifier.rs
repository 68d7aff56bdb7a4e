//! Model-backed document classification.

use crate::cache::{MemoCache, content_key};
use crate::classification::types::{DocumentType, is_procurement_notice_part};
use crate::completion::{CompletionClient, CompletionError, CompletionRequest};
use std::sync::Arc;

/// Characters of extracted text shown to the model.
pub const CLASSIFICATION_EXCERPT_CHARS: usize = 4000;
const CLASSIFICATION_MAX_TOKENS: u32 = 20;

const OPTIONS_BLOCK: &str = "Escolha apenas UMA destas opções:
Contrato, Termo Aditivo, Relatório, Ofício, Ata, Proposta, Minuta,
Termo de Apostilamento, Edital de Licitação, Termo de Referência, Outro.
Se nenhuma se aplicar, responda com um rótulo curto de no máximo 3 palavras.";

/// Memo of classification results keyed by document name and text.
pub type ClassificationMemo = MemoCache<String, DocumentType>;

/// Assigns a [`DocumentType`] to a document from its name and extracted text.
#[derive(Clone)]
pub struct Classifier {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl Classifier {
    /// Build a classifier using `model` on the given completion client.
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Classify one document.
    ///
    /// Procurement-notice filenames short-circuit without a model call. Failures propagate; no
    /// fallback label is invented.
    pub async fn classify(
        &self,
        name: &str,
        text: Option<&str>,
    ) -> Result<DocumentType, CompletionError> {
        if is_procurement_notice_part(name) {
            tracing::debug!(document = name, "Filename marks a procurement notice");
            return Ok(DocumentType::PROCUREMENT_NOTICE);
        }

        let request = CompletionRequest::user_prompt(&self.model, build_prompt(name, text))
            .with_temperature(0.0)
            .with_max_output_tokens(CLASSIFICATION_MAX_TOKENS);
        let answer = self.client.complete(request).await?;
        let document_type = DocumentType::normalize_for_file(&answer, Some(name));
        tracing::info!(
            document = name,
            answer = %answer,
            document_type = %document_type,
            "Classified document"
        );
        Ok(document_type)
    }

    /// [`Classifier::classify`] behind a session memo: identical `(name, text)` pairs are
    /// answered from `memo`.
    pub async fn classify_cached(
        &self,
        memo: &mut ClassificationMemo,
        name: &str,
        text: Option<&str>,
    ) -> Result<DocumentType, CompletionError> {
        let key = content_key(&[name, text.unwrap_or_default()]);
        if memo.get(&key).is_some() {
            tracing::debug!(document = name, "Classification memo hit");
        }
        memo.get_or_try_compute(key, || self.classify(name, text))
            .await
    }
}

fn build_prompt(name: &str, text: Option<&str>) -> String {
    match text.filter(|text| !text.trim().is_empty()) {
        Some(text) => {
            let excerpt: String = text.chars().take(CLASSIFICATION_EXCERPT_CHARS).collect();
            format!(
                "Classifique o tipo do documento com base no conteúdo abaixo:\n\n{excerpt}\n\n{OPTIONS_BLOCK}\n"
            )
        }
        None => format!(
            "Classifique o tipo do documento com base no nome abaixo:\n\n\"{name}\"\n\n{OPTIONS_BLOCK}\n"
        ),
    }
}

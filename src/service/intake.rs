//! Intake service coordinating extraction, classification, summarization and chat.

use crate::{
    chunking::{BpeTokenizer, Tokenizer},
    classification::{Classifier, DocumentType},
    completion::{CompletionClient, OpenAiCompletionClient},
    config::Config,
    extraction::{UNSUPPORTED_FORMAT_NOTICE, expand_upload},
    metrics::{IntakeMetrics, MetricsSnapshot},
    retrieval::{
        ChatTurn, ConversationalChat, EmbeddingClient, RetrievalError,
        embedding_client_from_config,
    },
    service::types::{ChatAnswer, DocumentDeadlines, DocumentSummary, IntakeError, UploadOutcome},
    session::{
        ChatScope, Classification, ClassificationGroups, Session, deadline_key, summary_key,
    },
    summarization::{DeadlineExtractor, Summarizer},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Abstraction over the intake commands used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait IntakeApi: Send + Sync {
    /// Add an upload to the session, expanding ZIP archives into their supported members.
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<UploadOutcome, IntakeError>;

    /// Names of the uploaded documents, in upload order.
    async fn list_documents(&self) -> Vec<String>;

    /// Drop every document and everything derived from them.
    async fn clear(&self);

    /// Classify every document without a classification; returns all classifications.
    async fn classify_all(&self) -> Result<Vec<Classification>, IntakeError>;

    /// Manually assign (and confirm) a document's type.
    async fn override_type(
        &self,
        name: &str,
        document_type: DocumentType,
    ) -> Result<Classification, IntakeError>;

    /// Confirm one document's classification.
    async fn confirm(&self, name: &str) -> Result<Classification, IntakeError>;

    /// Confirm every pending classification; returns all classifications.
    async fn confirm_all(&self) -> Vec<Classification>;

    /// Confirmed documents grouped by type.
    async fn groups(&self) -> ClassificationGroups;

    /// Summarize every confirmed document of a type.
    async fn summarize_type(
        &self,
        document_type: &DocumentType,
    ) -> Result<Vec<DocumentSummary>, IntakeError>;

    /// Extract deadlines from every confirmed document of a type.
    async fn deadlines_for_type(
        &self,
        document_type: &DocumentType,
    ) -> Result<Vec<DocumentDeadlines>, IntakeError>;

    /// Answer a question about the documents in `scope`.
    async fn ask(&self, scope: ChatScope, question: &str) -> Result<ChatAnswer, IntakeError>;

    /// Conversation of a scope, oldest turn first.
    async fn chat_history(&self, scope: ChatScope) -> Result<Vec<ChatTurn>, IntakeError>;

    /// Forget the conversation of a scope.
    async fn clear_chat(&self, scope: ChatScope) -> Result<(), IntakeError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns one session and the model-backed components that act on it.
///
/// Commands are serialized through the session lock, so two requests never race on the same
/// memo entry. Construct the service once near process start and share it through an `Arc`.
pub struct IntakeService {
    session: Mutex<Session>,
    classifier: Classifier,
    summarizer: Summarizer,
    deadlines: DeadlineExtractor,
    chat: ConversationalChat,
    metrics: Arc<IntakeMetrics>,
}

impl IntakeService {
    /// Build the service against the OpenAI-compatible endpoints named by `config`.
    pub fn from_config(config: &Config) -> Result<Self, IntakeError> {
        tracing::info!(model = %config.tokenizer_model, "Loading tokenizer");
        let tokenizer = Arc::new(BpeTokenizer::for_model(&config.tokenizer_model)?);
        let completion = Arc::new(OpenAiCompletionClient::from_config(config)?);
        let embeddings = embedding_client_from_config(config).map_err(RetrievalError::from)?;
        tracing::info!(
            provider = ?config.embedding_provider,
            has_api_key = config.has_api_key(),
            "Model clients initialized"
        );
        Ok(Self::with_clients(config, completion, tokenizer, embeddings))
    }

    /// Build the service around explicit clients, using `config` for models and sizes.
    pub fn with_clients(
        config: &Config,
        completion: Arc<dyn CompletionClient>,
        tokenizer: Arc<dyn Tokenizer>,
        embeddings: Arc<dyn EmbeddingClient>,
    ) -> Self {
        Self {
            session: Mutex::new(Session::new()),
            classifier: Classifier::new(completion.clone(), config.classification_model.clone()),
            summarizer: Summarizer::new(
                completion.clone(),
                tokenizer.clone(),
                config.summary_model.clone(),
                config.summary_chunk_tokens,
            ),
            deadlines: DeadlineExtractor::new(
                completion.clone(),
                tokenizer,
                config.summary_model.clone(),
                config.deadline_split_threshold,
                config.summary_chunk_tokens,
            ),
            chat: ConversationalChat::new(
                completion,
                embeddings,
                config.chat_model.clone(),
                config.chat_top_k,
                config.chat_chunk_size,
                config.chat_chunk_overlap,
            ),
            metrics: Arc::new(IntakeMetrics::new()),
        }
    }

    fn record_memo_use(&self, hits_before: u64, hits_after: u64, record_miss: fn(&IntakeMetrics)) {
        if hits_after > hits_before {
            self.metrics.record_cache_hit();
        } else {
            record_miss(&self.metrics);
        }
    }
}

#[async_trait]
impl IntakeApi for IntakeService {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<UploadOutcome, IntakeError> {
        let files = expand_upload(name, bytes)?;
        let mut session = self.session.lock().await;
        let mut outcome = UploadOutcome::default();
        for file in files {
            if session.add_document(file.name.clone(), file.bytes) {
                outcome.added.push(file.name);
            } else {
                outcome.skipped.push(file.name);
            }
        }
        self.metrics.record_uploads(outcome.added.len() as u64);
        tracing::info!(
            upload = name,
            added = outcome.added.len(),
            skipped = outcome.skipped.len(),
            "Upload stored"
        );
        Ok(outcome)
    }

    async fn list_documents(&self) -> Vec<String> {
        self.session.lock().await.document_names()
    }

    async fn clear(&self) {
        self.session.lock().await.clear();
        tracing::info!("Session cleared");
    }

    async fn classify_all(&self) -> Result<Vec<Classification>, IntakeError> {
        let mut session = self.session.lock().await;
        let pending = session.unclassified();
        tracing::info!(pending = pending.len(), "Classifying documents");
        for name in pending {
            let text = match session.text(&name) {
                Ok(text) if text != UNSUPPORTED_FORMAT_NOTICE => Some(text),
                Ok(_) => None,
                Err(error) => {
                    tracing::warn!(document = %name, error = %error, "Classifying by name only");
                    None
                }
            };
            let hits_before = session.classification_memo().hits();
            let document_type = self
                .classifier
                .classify_cached(session.classification_memo(), &name, text.as_deref())
                .await?;
            let hits_after = session.classification_memo().hits();
            self.record_memo_use(hits_before, hits_after, IntakeMetrics::record_classification);
            session.record_classification(&name, document_type)?;
        }
        Ok(session.classifications())
    }

    async fn override_type(
        &self,
        name: &str,
        document_type: DocumentType,
    ) -> Result<Classification, IntakeError> {
        let mut session = self.session.lock().await;
        Ok(session.override_type(name, document_type)?.clone())
    }

    async fn confirm(&self, name: &str) -> Result<Classification, IntakeError> {
        let mut session = self.session.lock().await;
        let classification = session.confirm(name)?.clone();
        tracing::info!(document = name, document_type = %classification.document_type, "Classification confirmed");
        Ok(classification)
    }

    async fn confirm_all(&self) -> Vec<Classification> {
        let mut session = self.session.lock().await;
        let confirmed = session.confirm_all();
        tracing::info!(confirmed = confirmed.len(), "Pending classifications confirmed");
        session.classifications()
    }

    async fn groups(&self) -> ClassificationGroups {
        self.session.lock().await.groups()
    }

    async fn summarize_type(
        &self,
        document_type: &DocumentType,
    ) -> Result<Vec<DocumentSummary>, IntakeError> {
        let mut session = self.session.lock().await;
        let names = session.confirmed_of_type(document_type);
        tracing::info!(document_type = %document_type, documents = names.len(), "Summarizing group");
        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let text = session.text(&name)?;
            let memo = session.summary_memo();
            let hits_before = memo.hits();
            let summary = memo
                .get_or_try_compute(summary_key(&name, &text, document_type), || {
                    self.summarizer.summarize(&text, document_type)
                })
                .await?;
            let hits_after = session.summary_memo().hits();
            self.record_memo_use(hits_before, hits_after, IntakeMetrics::record_summary);
            summaries.push(DocumentSummary { name, summary });
        }
        Ok(summaries)
    }

    async fn deadlines_for_type(
        &self,
        document_type: &DocumentType,
    ) -> Result<Vec<DocumentDeadlines>, IntakeError> {
        let mut session = self.session.lock().await;
        let names = session.confirmed_of_type(document_type);
        tracing::info!(document_type = %document_type, documents = names.len(), "Extracting group deadlines");
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let text = session.text(&name)?;
            let memo = session.deadline_memo();
            let hits_before = memo.hits();
            let report = memo
                .get_or_try_compute_if(
                    deadline_key(&name, &text),
                    || self.deadlines.extract(&text),
                    |report| !report.had_failures,
                )
                .await?;
            if report.had_failures {
                tracing::warn!(document = %name, "Deadline extraction incomplete; not memoized");
            }
            let hits_after = session.deadline_memo().hits();
            self.record_memo_use(
                hits_before,
                hits_after,
                IntakeMetrics::record_deadline_extraction,
            );
            results.push(DocumentDeadlines {
                name,
                deadlines: report.deadlines,
            });
        }
        Ok(results)
    }

    async fn ask(&self, scope: ChatScope, question: &str) -> Result<ChatAnswer, IntakeError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(IntakeError::InvalidRequest("question must not be empty".into()));
        }

        let mut session = self.session.lock().await;
        let names = session.scope_documents(&scope)?;
        if names.is_empty() {
            return Err(IntakeError::InvalidRequest("no documents uploaded".into()));
        }
        let index = match session.take_chat_index(&scope) {
            Some(index) => index,
            None => {
                let texts = names
                    .iter()
                    .map(|name| session.text(name))
                    .collect::<Result<Vec<_>, _>>()?;
                let index = self.chat.build_index(&texts).await?;
                tracing::info!(scope = ?scope, windows = index.len(), "Chat index built");
                index
            }
        };

        let answer = self
            .chat
            .ask(&index, session.history(&scope), question)
            .await;
        session.store_chat_index(scope.clone(), index);
        let answer = answer?;

        session.push_turn(scope, ChatTurn::new(question, answer.clone()));
        self.metrics.record_chat_question();
        Ok(ChatAnswer { answer })
    }

    async fn chat_history(&self, scope: ChatScope) -> Result<Vec<ChatTurn>, IntakeError> {
        let session = self.session.lock().await;
        session.scope_documents(&scope)?;
        Ok(session.history(&scope).to_vec())
    }

    async fn clear_chat(&self, scope: ChatScope) -> Result<(), IntakeError> {
        let mut session = self.session.lock().await;
        session.scope_documents(&scope)?;
        session.clear_history(&scope);
        tracing::info!(scope = ?scope, "Chat history cleared");
        Ok(())
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::testing::CharTokenizer;
    use crate::classification::KnownType;
    use crate::completion::CompletionError;
    use crate::completion::testing::ScriptedCompletionClient;
    use crate::config::EmbeddingProvider;
    use crate::retrieval::HashingEmbeddingClient;
    use crate::service::types::ErrorKind;
    use crate::session::SessionError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> Config {
        Config {
            embedding_provider: EmbeddingProvider::Hashing,
            summary_chunk_tokens: 1000,
            ..Config::default()
        }
    }

    fn service_with(client: ScriptedCompletionClient) -> (IntakeService, Arc<ScriptedCompletionClient>) {
        let client = Arc::new(client);
        let service = IntakeService::with_clients(
            &test_config(),
            client.clone(),
            Arc::new(CharTokenizer),
            Arc::new(HashingEmbeddingClient::new(64)),
        );
        (service, client)
    }

    #[tokio::test]
    async fn duplicate_uploads_keep_first_content() {
        let (service, _) = service_with(ScriptedCompletionClient::replying("Contrato"));
        let first = service
            .upload("a.txt", b"primeiro".to_vec())
            .await
            .expect("upload");
        let second = service
            .upload("a.txt", b"segundo".to_vec())
            .await
            .expect("upload");

        assert_eq!(first.added, vec!["a.txt"]);
        assert_eq!(second.skipped, vec!["a.txt"]);
        assert_eq!(service.list_documents().await, vec!["a.txt"]);
        assert_eq!(service.metrics_snapshot().documents_uploaded, 1);
    }

    #[tokio::test]
    async fn classification_uses_filename_gate_and_memo() {
        let (service, client) = service_with(ScriptedCompletionClient::replying("Contrato"));
        service
            .upload("Edital_parte1.txt", b"qualquer".to_vec())
            .await
            .expect("upload");
        service
            .upload("acordo.txt", b"contrato de prestacao".to_vec())
            .await
            .expect("upload");

        let classifications = service.classify_all().await.expect("classify");
        assert_eq!(classifications.len(), 2);
        assert_eq!(
            classifications[0].document_type,
            DocumentType::PROCUREMENT_NOTICE
        );
        assert_eq!(
            classifications[1].document_type,
            DocumentType::from(KnownType::Contrato)
        );
        assert!(classifications.iter().all(|c| !c.confirmed));
        assert_eq!(client.call_count(), 1);

        // Already classified documents are not sent again.
        service.classify_all().await.expect("classify");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn confirmed_classifications_are_locked() {
        let (service, _) = service_with(ScriptedCompletionClient::replying("Ofício"));
        service
            .upload("nota.txt", b"texto".to_vec())
            .await
            .expect("upload");
        service.classify_all().await.expect("classify");
        service.confirm("nota.txt").await.expect("confirm");

        let error = service
            .override_type("nota.txt", KnownType::Ata.into())
            .await
            .expect_err("locked");
        assert!(matches!(
            error,
            IntakeError::Session(SessionError::ClassificationLocked(_))
        ));
        assert_eq!(error.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn summaries_are_memoized_per_document() {
        let (service, client) = service_with(ScriptedCompletionClient::new(|request| {
            Ok(if request.max_output_tokens == Some(20) {
                "Relatório".to_string()
            } else {
                "resumo".to_string()
            })
        }));
        service
            .upload("r.txt", b"relatorio anual de atividades".to_vec())
            .await
            .expect("upload");
        service.classify_all().await.expect("classify");
        service.confirm_all().await;

        let relatorio = DocumentType::from(KnownType::Relatorio);
        let first = service.summarize_type(&relatorio).await.expect("summary");
        let calls = client.call_count();
        let second = service.summarize_type(&relatorio).await.expect("summary");

        assert_eq!(first, second);
        assert_eq!(first[0].summary, "resumo");
        assert_eq!(client.call_count(), calls);
        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.summaries, 1);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[tokio::test]
    async fn deadline_results_with_failed_parts_are_retried() {
        let deadline_calls = Arc::new(AtomicUsize::new(0));
        let counter = deadline_calls.clone();
        let (service, client) = service_with(ScriptedCompletionClient::new(move |request| {
            if request.max_output_tokens == Some(20) {
                return Ok("Contrato".to_string());
            }
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(CompletionError::GenerationFailed("endpoint returned 503".into()));
            }
            Ok("- Vigência: 12 meses".to_string())
        }));
        service
            .upload("c.txt", b"contrato com vigencia de 12 meses".to_vec())
            .await
            .expect("upload");
        service.classify_all().await.expect("classify");
        service.confirm_all().await;
        let contrato = DocumentType::from(KnownType::Contrato);

        let first = service.deadlines_for_type(&contrato).await.expect("deadlines");
        assert_eq!(first[0].deadlines.len(), 1);
        assert!(first[0].deadlines[0].starts_with("Erro ao processar parte 1:"));

        let second = service.deadlines_for_type(&contrato).await.expect("deadlines");
        assert_eq!(second[0].deadlines, vec!["Vigência: 12 meses"]);
        let calls = client.call_count();

        let third = service.deadlines_for_type(&contrato).await.expect("deadlines");
        assert_eq!(third, second);
        assert_eq!(client.call_count(), calls);
        assert_eq!(deadline_calls.load(Ordering::SeqCst), 2);
        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.deadline_extractions, 2);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[tokio::test]
    async fn unconfirmed_documents_are_not_summarized() {
        let (service, client) = service_with(ScriptedCompletionClient::replying("Contrato"));
        service
            .upload("c.txt", b"clausulas".to_vec())
            .await
            .expect("upload");
        service.classify_all().await.expect("classify");
        let calls = client.call_count();

        let summaries = service
            .summarize_type(&KnownType::Contrato.into())
            .await
            .expect("summary");
        assert!(summaries.is_empty());
        assert_eq!(client.call_count(), calls);
    }

    #[tokio::test]
    async fn chat_records_history_per_scope() {
        let (service, _) = service_with(ScriptedCompletionClient::replying("Resposta"));
        service
            .upload("a.txt", b"O prazo de entrega e 10 dias.".to_vec())
            .await
            .expect("upload");

        let answer = service
            .ask(ChatScope::All, "Qual o prazo?")
            .await
            .expect("answer");
        assert_eq!(answer.answer, "Resposta");
        let history = service.chat_history(ChatScope::All).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "Qual o prazo?");

        let scoped = service
            .chat_history(ChatScope::Document("a.txt".into()))
            .await
            .expect("history");
        assert!(scoped.is_empty());

        service.clear_chat(ChatScope::All).await.expect("clear");
        assert!(service
            .chat_history(ChatScope::All)
            .await
            .expect("history")
            .is_empty());
    }

    #[tokio::test]
    async fn chat_rejects_unknown_documents_and_blank_questions() {
        let (service, client) = service_with(ScriptedCompletionClient::replying("x"));
        let error = service
            .ask(ChatScope::Document("nada.pdf".into()), "Oi?")
            .await
            .expect_err("unknown");
        assert_eq!(error.kind(), ErrorKind::NotFound);

        let error = service
            .ask(ChatScope::All, "   ")
            .await
            .expect_err("blank");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
        assert_eq!(client.call_count(), 0);
    }
}

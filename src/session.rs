//! Explicit session context shared by every intake command.
//!
//! A session owns the uploaded documents and everything derived from them: extracted text,
//! classifications, memoized model output and chat state. Nothing is evicted until
//! [`Session::clear`].

use crate::cache::{MemoCache, content_key};
use crate::classification::{ClassificationMemo, DocumentType};
use crate::extraction::{ExtractionError, extract_text};
use crate::retrieval::{ChatTurn, VectorIndex};
use crate::summarization::DeadlineReport;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors raised by session state transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No document with this name was uploaded.
    #[error("Unknown document '{0}'")]
    UnknownDocument(String),
    /// The document has not been classified yet.
    #[error("Document '{0}' has not been classified")]
    NotClassified(String),
    /// The classification was already confirmed and can no longer change.
    #[error("Classification of '{0}' is already confirmed")]
    ClassificationLocked(String),
    /// Text extraction failed for a supported format.
    #[error("Failed to extract text from '{name}': {source}")]
    Extraction {
        /// Document name.
        name: String,
        /// Underlying parser error.
        #[source]
        source: ExtractionError,
    },
}

/// An uploaded document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Unique name within the session.
    pub name: String,
    /// Raw file contents.
    pub content: Vec<u8>,
}

/// Type assigned to a document, and whether the user accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Document name.
    pub name: String,
    /// Assigned type.
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    /// Set once; never reverts.
    pub confirmed: bool,
}

/// Confirmed documents grouped by type.
pub type ClassificationGroups = BTreeMap<DocumentType, Vec<String>>;

/// Which documents a chat conversation covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatScope {
    /// Every uploaded document.
    All,
    /// A single document.
    Document(String),
}

impl From<Option<String>> for ChatScope {
    fn from(document: Option<String>) -> Self {
        match document {
            Some(name) => Self::Document(name),
            None => Self::All,
        }
    }
}

/// Memo of summaries keyed by document name, text and type.
pub type SummaryMemo = MemoCache<String, String>;
/// Memo of deadline reports keyed by document name and text; only clean reports are stored.
pub type DeadlineMemo = MemoCache<String, DeadlineReport>;

/// State of one intake session.
#[derive(Default)]
pub struct Session {
    documents: Vec<Document>,
    texts: MemoCache<String, String>,
    classification_memo: ClassificationMemo,
    classifications: HashMap<String, Classification>,
    summaries: SummaryMemo,
    deadlines: DeadlineMemo,
    chat_indexes: HashMap<ChatScope, VectorIndex>,
    chat_histories: HashMap<ChatScope, Vec<ChatTurn>>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document; returns `false` (keeping the first content) when the name already exists.
    pub fn add_document(&mut self, name: impl Into<String>, content: Vec<u8>) -> bool {
        let name = name.into();
        if self.document(&name).is_some() {
            tracing::debug!(document = %name, "Document already uploaded; keeping first content");
            return false;
        }
        self.documents.push(Document { name, content });
        // The all-documents index no longer covers every document.
        self.chat_indexes.remove(&ChatScope::All);
        true
    }

    /// Look up a document by name.
    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|document| document.name == name)
    }

    /// Document names in upload order.
    pub fn document_names(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|document| document.name.clone())
            .collect()
    }

    /// Drop every document and all derived state.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.texts.clear();
        self.classification_memo.clear();
        self.classifications.clear();
        self.summaries.clear();
        self.deadlines.clear();
        self.chat_indexes.clear();
        self.chat_histories.clear();
    }

    /// Extracted text of a document, computed on first access.
    pub fn text(&mut self, name: &str) -> Result<String, SessionError> {
        let document = self
            .documents
            .iter()
            .find(|document| document.name == name)
            .ok_or_else(|| SessionError::UnknownDocument(name.to_string()))?;
        self.texts
            .get_or_try_insert_with(name.to_string(), || {
                extract_text(&document.content, &document.name)
            })
            .cloned()
            .map_err(|source| SessionError::Extraction {
                name: name.to_string(),
                source,
            })
    }

    /// Memo consulted before classification calls.
    pub fn classification_memo(&mut self) -> &mut ClassificationMemo {
        &mut self.classification_memo
    }

    /// Memo consulted before summary calls.
    pub fn summary_memo(&mut self) -> &mut SummaryMemo {
        &mut self.summaries
    }

    /// Memo consulted before deadline extraction.
    pub fn deadline_memo(&mut self) -> &mut DeadlineMemo {
        &mut self.deadlines
    }

    /// Classification of a document, if any.
    pub fn classification(&self, name: &str) -> Option<&Classification> {
        self.classifications.get(name)
    }

    /// Names of documents that have no classification yet, in upload order.
    pub fn unclassified(&self) -> Vec<String> {
        self.documents
            .iter()
            .filter(|document| !self.classifications.contains_key(&document.name))
            .map(|document| document.name.clone())
            .collect()
    }

    /// Store an automatic (unconfirmed) classification.
    ///
    /// Confirmed classifications are left untouched.
    pub fn record_classification(
        &mut self,
        name: &str,
        document_type: DocumentType,
    ) -> Result<&Classification, SessionError> {
        self.require_document(name)?;
        let entry = self
            .classifications
            .entry(name.to_string())
            .or_insert_with(|| Classification {
                name: name.to_string(),
                document_type: document_type.clone(),
                confirmed: false,
            });
        if !entry.confirmed {
            entry.document_type = document_type;
        }
        Ok(entry)
    }

    /// Manually assign a type, which also confirms it.
    pub fn override_type(
        &mut self,
        name: &str,
        document_type: DocumentType,
    ) -> Result<&Classification, SessionError> {
        self.require_document(name)?;
        if self
            .classifications
            .get(name)
            .is_some_and(|classification| classification.confirmed)
        {
            return Err(SessionError::ClassificationLocked(name.to_string()));
        }
        let classification = Classification {
            name: name.to_string(),
            document_type,
            confirmed: true,
        };
        tracing::info!(document = name, document_type = %classification.document_type, "Type overridden");
        self.classifications.insert(name.to_string(), classification);
        self.classification(name)
            .ok_or_else(|| SessionError::NotClassified(name.to_string()))
    }

    /// Confirm a document's classification. Confirming twice is a no-op.
    pub fn confirm(&mut self, name: &str) -> Result<&Classification, SessionError> {
        self.require_document(name)?;
        let classification = self
            .classifications
            .get_mut(name)
            .ok_or_else(|| SessionError::NotClassified(name.to_string()))?;
        classification.confirmed = true;
        Ok(classification)
    }

    /// Confirm every pending classification; returns the newly confirmed names.
    pub fn confirm_all(&mut self) -> Vec<String> {
        let mut confirmed = Vec::new();
        for document in &self.documents {
            if let Some(classification) = self.classifications.get_mut(&document.name) {
                if !classification.confirmed {
                    classification.confirmed = true;
                    confirmed.push(document.name.clone());
                }
            }
        }
        confirmed
    }

    /// Every classification, in upload order.
    pub fn classifications(&self) -> Vec<Classification> {
        self.documents
            .iter()
            .filter_map(|document| self.classifications.get(&document.name).cloned())
            .collect()
    }

    /// Confirmed documents grouped by type, names in upload order.
    pub fn groups(&self) -> ClassificationGroups {
        let mut groups = ClassificationGroups::new();
        for classification in self.classifications() {
            if classification.confirmed {
                groups
                    .entry(classification.document_type)
                    .or_default()
                    .push(classification.name);
            }
        }
        groups
    }

    /// Confirmed documents of one type, in upload order.
    pub fn confirmed_of_type(&self, document_type: &DocumentType) -> Vec<String> {
        self.groups().remove(document_type).unwrap_or_default()
    }

    /// Documents covered by a chat scope.
    pub fn scope_documents(&self, scope: &ChatScope) -> Result<Vec<String>, SessionError> {
        match scope {
            ChatScope::All => Ok(self.document_names()),
            ChatScope::Document(name) => {
                self.require_document(name)?;
                Ok(vec![name.clone()])
            }
        }
    }

    /// Index built for a scope, if any.
    pub fn chat_index(&self, scope: &ChatScope) -> Option<&VectorIndex> {
        self.chat_indexes.get(scope)
    }

    /// Remove and return the index of a scope, to be stored back after use.
    pub fn take_chat_index(&mut self, scope: &ChatScope) -> Option<VectorIndex> {
        self.chat_indexes.remove(scope)
    }

    /// Keep the index built for a scope.
    pub fn store_chat_index(&mut self, scope: ChatScope, index: VectorIndex) {
        self.chat_indexes.insert(scope, index);
    }

    /// Turns of a scope's conversation, oldest first.
    pub fn history(&self, scope: &ChatScope) -> &[ChatTurn] {
        self.chat_histories
            .get(scope)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Append a turn to a scope's conversation.
    pub fn push_turn(&mut self, scope: ChatScope, turn: ChatTurn) {
        self.chat_histories.entry(scope).or_default().push(turn);
    }

    /// Forget a scope's conversation; its index is kept.
    pub fn clear_history(&mut self, scope: &ChatScope) {
        self.chat_histories.remove(scope);
    }

    fn require_document(&self, name: &str) -> Result<(), SessionError> {
        self.document(name)
            .map(|_| ())
            .ok_or_else(|| SessionError::UnknownDocument(name.to_string()))
    }
}

/// Memo key of a summary.
pub fn summary_key(name: &str, text: &str, document_type: &DocumentType) -> String {
    content_key(&[name, text, document_type.label()])
}

/// Memo key of a deadline list.
pub fn deadline_key(name: &str, text: &str) -> String {
    content_key(&[name, text])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::KnownType;
    use crate::extraction::UNSUPPORTED_FORMAT_NOTICE;

    fn session_with(names: &[&str]) -> Session {
        let mut session = Session::new();
        for name in names {
            session.add_document(*name, format!("conteúdo de {name}").into_bytes());
        }
        session
    }

    #[test]
    fn reuploads_keep_the_first_content() {
        let mut session = Session::new();
        assert!(session.add_document("a.txt", b"first".to_vec()));
        assert!(!session.add_document("a.txt", b"second".to_vec()));
        assert_eq!(session.document_names(), vec!["a.txt"]);
        assert_eq!(session.text("a.txt").expect("text"), "first");
    }

    #[test]
    fn text_is_extracted_once_and_unknown_documents_fail() {
        let mut session = session_with(&["a.txt", "b.bin"]);
        assert_eq!(session.text("a.txt").expect("text"), "conteúdo de a.txt");
        assert_eq!(session.text("b.bin").expect("text"), UNSUPPORTED_FORMAT_NOTICE);
        assert!(matches!(
            session.text("missing.pdf"),
            Err(SessionError::UnknownDocument(_))
        ));
    }

    #[test]
    fn extraction_failures_name_the_document() {
        let mut session = Session::new();
        session.add_document("quebrado.docx", b"not a zip".to_vec());
        let error = session.text("quebrado.docx").expect_err("bad docx");
        assert!(matches!(error, SessionError::Extraction { ref name, .. } if name == "quebrado.docx"));
    }

    #[test]
    fn override_confirms_and_then_locks() {
        let mut session = session_with(&["a.pdf"]);
        session
            .record_classification("a.pdf", KnownType::Contrato.into())
            .expect("recorded");

        let classification = session
            .override_type("a.pdf", KnownType::TermoAditivo.into())
            .expect("override");
        assert!(classification.confirmed);
        assert_eq!(classification.document_type, KnownType::TermoAditivo.into());

        let error = session
            .override_type("a.pdf", KnownType::Ata.into())
            .expect_err("locked");
        assert!(matches!(error, SessionError::ClassificationLocked(_)));
        assert_eq!(
            session.classification("a.pdf").map(|c| c.document_type.clone()),
            Some(KnownType::TermoAditivo.into())
        );
    }

    #[test]
    fn automatic_results_never_replace_confirmed_types() {
        let mut session = session_with(&["a.pdf"]);
        session
            .override_type("a.pdf", KnownType::Oficio.into())
            .expect("override");
        let classification = session
            .record_classification("a.pdf", KnownType::Contrato.into())
            .expect("recorded");
        assert_eq!(classification.document_type, KnownType::Oficio.into());
        assert!(classification.confirmed);
    }

    #[test]
    fn confirm_requires_a_classification() {
        let mut session = session_with(&["a.pdf"]);
        assert!(matches!(
            session.confirm("a.pdf"),
            Err(SessionError::NotClassified(_))
        ));
        assert!(matches!(
            session.confirm("zzz.pdf"),
            Err(SessionError::UnknownDocument(_))
        ));
    }

    #[test]
    fn groups_only_contain_confirmed_documents() {
        let mut session = session_with(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
        session
            .record_classification("a.pdf", KnownType::Contrato.into())
            .expect("a");
        session
            .record_classification("b.pdf", KnownType::Contrato.into())
            .expect("b");
        session
            .record_classification("c.pdf", KnownType::Ata.into())
            .expect("c");
        session.confirm("b.pdf").expect("confirm b");
        session.confirm("c.pdf").expect("confirm c");

        let groups = session.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&DocumentType::from(KnownType::Contrato)], vec!["b.pdf"]);
        assert_eq!(groups[&DocumentType::from(KnownType::Ata)], vec!["c.pdf"]);
        assert_eq!(session.unclassified(), vec!["d.pdf"]);

        assert_eq!(session.confirm_all(), vec!["a.pdf"]);
        assert_eq!(
            session.confirmed_of_type(&KnownType::Contrato.into()),
            vec!["a.pdf", "b.pdf"]
        );
    }

    #[test]
    fn uploads_invalidate_the_all_documents_index() {
        let mut session = session_with(&["a.txt"]);
        session.store_chat_index(ChatScope::All, VectorIndex::default());
        session.store_chat_index(ChatScope::Document("a.txt".into()), VectorIndex::default());

        session.add_document("b.txt", b"novo".to_vec());
        assert!(session.chat_index(&ChatScope::All).is_none());
        assert!(session.chat_index(&ChatScope::Document("a.txt".into())).is_some());
    }

    #[test]
    fn histories_are_per_scope_and_clear_resets_everything() {
        let mut session = session_with(&["a.txt"]);
        let scope = ChatScope::Document("a.txt".into());
        session.push_turn(scope.clone(), ChatTurn::new("q1", "a1"));
        session.push_turn(ChatScope::All, ChatTurn::new("q2", "a2"));
        assert_eq!(session.history(&scope).len(), 1);

        session.clear_history(&scope);
        assert!(session.history(&scope).is_empty());
        assert_eq!(session.history(&ChatScope::All).len(), 1);

        session.clear();
        assert!(session.document_names().is_empty());
        assert!(session.history(&ChatScope::All).is_empty());
        assert!(session.classifications().is_empty());
    }

    #[test]
    fn scope_documents_validate_names() {
        let session = session_with(&["a.txt", "b.txt"]);
        assert_eq!(
            session.scope_documents(&ChatScope::All).expect("all"),
            vec!["a.txt", "b.txt"]
        );
        assert!(matches!(
            session.scope_documents(&ChatScope::Document("x".into())),
            Err(SessionError::UnknownDocument(_))
        ));
        assert_eq!(ChatScope::from(None), ChatScope::All);
    }
}

//! Conversational question answering over a document vector index.

use crate::completion::{ChatMessage, CompletionClient, CompletionRequest};
use crate::retrieval::RetrievalError;
use crate::retrieval::embedding::EmbeddingClient;
use crate::retrieval::index::VectorIndex;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const CHAT_TEMPERATURE: f32 = 0.3;

const CONDENSE_INSTRUCTIONS: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

const ANSWER_INSTRUCTIONS: &str = "Use the following pieces of context to answer the user's \
question.\nIf you don't know the answer, just say that you don't know, don't try to make up an \
answer.\n----------------\n";

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    /// Question as asked.
    pub question: String,
    /// Model answer.
    pub answer: String,
    /// When the question was answered (RFC 3339, UTC).
    pub asked_at: String,
}

impl ChatTurn {
    /// Record a turn answered now.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string()),
        }
    }
}

/// Retrieval-augmented question answering over an index, aware of previous turns.
#[derive(Clone)]
pub struct ConversationalChat {
    completion: Arc<dyn CompletionClient>,
    embeddings: Arc<dyn EmbeddingClient>,
    model: String,
    top_k: usize,
    window: usize,
    overlap: usize,
}

impl ConversationalChat {
    /// Build a chat engine.
    ///
    /// `window` and `overlap` (characters) shape the indexes built by
    /// [`ConversationalChat::build_index`]; `top_k` windows back every answer.
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        embeddings: Arc<dyn EmbeddingClient>,
        model: impl Into<String>,
        top_k: usize,
        window: usize,
        overlap: usize,
    ) -> Self {
        Self {
            completion,
            embeddings,
            model: model.into(),
            top_k,
            window,
            overlap,
        }
    }

    /// Index the given document texts.
    pub async fn build_index(&self, texts: &[String]) -> Result<VectorIndex, RetrievalError> {
        VectorIndex::build(self.embeddings.as_ref(), texts, self.window, self.overlap).await
    }

    /// Answer `question` from `index`.
    ///
    /// With prior turns, the question is first rewritten into a standalone one so retrieval
    /// does not depend on pronouns and ellipses resolved by the conversation.
    pub async fn ask(
        &self,
        index: &VectorIndex,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<String, RetrievalError> {
        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            self.condense(history, question).await?
        };

        let query = self
            .embeddings
            .generate_embeddings(vec![standalone.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or(RetrievalError::IndexMismatch {
                chunks: 1,
                vectors: 0,
            })?;
        let context = index.top_k(&query, self.top_k);
        tracing::debug!(
            retrieved = context.len(),
            history = history.len(),
            condensed = !history.is_empty(),
            "Answering chat question"
        );

        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(format!(
            "{ANSWER_INSTRUCTIONS}{}",
            context.join("\n\n")
        )));
        for turn in history {
            messages.push(ChatMessage::user(turn.question.as_str()));
            messages.push(ChatMessage::assistant(turn.answer.as_str()));
        }
        messages.push(ChatMessage::user(standalone));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: CHAT_TEMPERATURE,
            max_output_tokens: None,
        };
        Ok(self.completion.complete(request).await?)
    }

    async fn condense(&self, history: &[ChatTurn], question: &str) -> Result<String, RetrievalError> {
        let transcript: String = history
            .iter()
            .map(|turn| format!("\nHuman: {}\nAssistant: {}", turn.question, turn.answer))
            .collect();
        let prompt = format!(
            "{CONDENSE_INSTRUCTIONS}\n\nChat History:{transcript}\nFollow Up Input: {question}\nStandalone question:"
        );
        let request = CompletionRequest::user_prompt(&self.model, prompt)
            .with_temperature(CHAT_TEMPERATURE);
        let standalone = self.completion.complete(request).await?;
        if standalone.trim().is_empty() {
            return Ok(question.to_string());
        }
        Ok(standalone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Role;
    use crate::completion::testing::ScriptedCompletionClient;
    use crate::retrieval::embedding::HashingEmbeddingClient;

    fn chat(client: &ScriptedCompletionClient) -> ConversationalChat {
        ConversationalChat::new(
            Arc::new(client.clone()),
            Arc::new(HashingEmbeddingClient::new(128)),
            "gpt-3.5-turbo",
            4,
            120,
            20,
        )
    }

    fn texts() -> Vec<String> {
        vec![
            "Contrato 12/2024. O pagamento mensal será feito até o décimo dia útil.".into(),
            "Ata de reunião. Participaram cinco diretores da companhia.".into(),
        ]
    }

    #[tokio::test]
    async fn first_question_goes_straight_to_retrieval() {
        let client = ScriptedCompletionClient::replying("Até o décimo dia útil.");
        let chat = chat(&client);
        let index = chat.build_index(&texts()).await.expect("index");

        let answer = chat
            .ask(&index, &[], "Quando é o pagamento mensal?")
            .await
            .expect("answer");

        assert_eq!(answer, "Até o décimo dia útil.");
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.temperature, CHAT_TEMPERATURE);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("pagamento mensal"));
        assert_eq!(request.prompt_text(), "Quando é o pagamento mensal?");
    }

    #[tokio::test]
    async fn follow_ups_are_condensed_first() {
        let client = ScriptedCompletionClient::new(|request| {
            if request.prompt_text().contains("Standalone question:") {
                Ok("Quantos diretores participaram da reunião?".into())
            } else {
                Ok("Cinco.".into())
            }
        });
        let chat = chat(&client);
        let index = chat.build_index(&texts()).await.expect("index");
        let history = vec![ChatTurn::new("Houve reunião?", "Sim, da diretoria.")];

        let answer = chat
            .ask(&index, &history, "Quantos participaram?")
            .await
            .expect("answer");

        assert_eq!(answer, "Cinco.");
        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        let condense = requests[0].prompt_text();
        assert!(condense.contains("Human: Houve reunião?\nAssistant: Sim, da diretoria."));
        assert!(condense.contains("Follow Up Input: Quantos participaram?"));
        let answer_request = &requests[1];
        assert_eq!(answer_request.messages.len(), 4);
        assert_eq!(answer_request.messages[2].role, Role::Assistant);
        assert_eq!(
            answer_request.messages[3].content,
            "Quantos diretores participaram da reunião?"
        );
    }

    #[test]
    fn turns_carry_a_timestamp() {
        let turn = ChatTurn::new("q", "a");
        assert!(turn.asked_at.ends_with('Z'));
        assert!(turn.asked_at.contains('T'));
    }
}

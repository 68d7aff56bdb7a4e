//! Text-completion collaborator used by classification, summarization, deadlines and chat.
//!
//! Every model interaction in the crate goes through [`CompletionClient`]. The production
//! adapter talks to an OpenAI-compatible `/chat/completions` endpoint; tests substitute scripted
//! clients. Credentials are checked before any request is built so a missing key surfaces as
//! [`CompletionError::Configuration`] without touching the network.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Credentials or endpoint settings are missing; never retried.
    #[error("Completion service is not configured: {0}")]
    Configuration(String),
    /// The endpoint could not be reached.
    #[error("Completion service unavailable: {0}")]
    Unavailable(String),
    /// The endpoint answered with an error status.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// The endpoint answered with a body that could not be interpreted.
    #[error("Malformed completion response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Whether the failure stems from missing configuration rather than the remote service.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

/// One message of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request payload passed to the completion provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Ordered conversation sent to the model.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional cap on generated tokens.
    pub max_output_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Single user-prompt request with provider-default sampling.
    pub fn user_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: 1.0,
            max_output_tokens: None,
        }
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the number of generated tokens.
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Concatenated text of the user messages, handy for logging and test assertions.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .filter(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Interface implemented by text-completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate text for the request; the returned string is trimmed.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompletionClient {
    /// Build a client for the given endpoint; `api_key` is validated on each call.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .user_agent("docintake/completion")
            .timeout(timeout)
            .build()
            .map_err(|error| CompletionError::Configuration(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    /// Build a client from runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        Self::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CompletionError::Configuration(
                "OPENAI_API_KEY is not set".into(),
            ));
        };

        let mut payload = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_output_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        tracing::debug!(
            model = %request.model,
            temperature = request.temperature,
            max_output_tokens = ?request.max_output_tokens,
            messages = request.messages.len(),
            "Requesting completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionError::Unavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CompletionError::Configuration(
                "completion endpoint rejected the API key".into(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::GenerationFailed(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            CompletionError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CompletionError::InvalidResponse("response carried no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> OpenAiCompletionClient {
        OpenAiCompletionClient::new(
            server.base_url(),
            api_key.map(str::to_string),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn returns_trimmed_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(r#"{"model":"gpt-4o-mini","temperature":0.0,"max_tokens":20}"#);
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "  Contrato \n" } }
                    ]
                }));
            })
            .await;

        let text = client_for(&server, Some("test-key"))
            .complete(
                CompletionRequest::user_prompt("gpt-4o-mini", "Classifique")
                    .with_temperature(0.0)
                    .with_max_output_tokens(20),
            )
            .await
            .expect("completion");

        mock.assert();
        assert_eq!(text, "Contrato");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200);
            })
            .await;

        let error = client_for(&server, None)
            .complete(CompletionRequest::user_prompt("m", "p"))
            .await
            .expect_err("configuration error");

        assert!(error.is_configuration());
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn error_status_maps_to_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = client_for(&server, Some("k"))
            .complete(CompletionRequest::user_prompt("m", "p"))
            .await
            .expect_err("error response");

        assert!(
            matches!(error, CompletionError::GenerationFailed(ref message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn empty_choices_are_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client_for(&server, Some("k"))
            .complete(CompletionRequest::user_prompt("m", "p"))
            .await
            .expect_err("invalid response");

        assert!(matches!(error, CompletionError::InvalidResponse(_)));
    }

    #[test]
    fn prompt_text_joins_user_messages_only() {
        let request = CompletionRequest {
            model: "m".into(),
            messages: vec![
                ChatMessage::system("rules"),
                ChatMessage::user("first"),
                ChatMessage::assistant("reply"),
                ChatMessage::user("second"),
            ],
            temperature: 0.3,
            max_output_tokens: None,
        };
        assert_eq!(request.prompt_text(), "first\nsecond");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Responder = dyn Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync;

    /// Completion client answering from a closure and recording every request.
    #[derive(Clone)]
    pub(crate) struct ScriptedCompletionClient {
        responder: Arc<Responder>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ScriptedCompletionClient {
        pub(crate) fn new<F>(responder: F) -> Self
        where
            F: Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync + 'static,
        {
            Self {
                responder: Arc::new(responder),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn replying(text: &str) -> Self {
            let text = text.to_string();
            Self::new(move |_| Ok(text.clone()))
        }

        pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().expect("requests lock").clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletionClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            (self.responder)(&request).map(|text| text.trim().to_string())
        }
    }
}

//! Rewrite and chat client
//!
//! One-shot calls to an OpenAI-compatible chat completions endpoint:
//! - [`RewriteClient::rewrite`]: rewrite text according to a prompt
//! - [`RewriteClient::chat`]: financial-expert assistant with running history
//!
//! No retries, batching or aggregation: the reply text is returned verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use starc_common::config::{is_valid_value, RewriteSettings};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("starc-sa/", env!("CARGO_PKG_VERSION"));

/// System message for rewrites
pub const REWRITE_SYSTEM_PROMPT: &str = "You rewrite passages from corporate financial \
disclosures. Follow the user's instruction and reply with the rewritten passage only.";

/// System message for the chat assistant
pub const CHAT_SYSTEM_PROMPT: &str = "You are a financial expert, knowledgeable about US laws \
and policies related to investing, taxation, businesses, and the economy. Keep your responses \
brief, straightforward and to the point. Do not repeat back the user prompt or use wording \
that makes you sound like an AI assistant.";

/// Rewrite/chat errors
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty completion")]
    EmptyResponse,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for RewriteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RewriteError::Timeout
        } else if e.is_decode() {
            RewriteError::Parse(e.to_string())
        } else {
            RewriteError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat reply with the updated conversation
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub history: Vec<ChatMessage>,
}

/// Transport seam for text generation
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a conversation and return the first choice's message content
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RewriteError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// reqwest-backed chat completions client
pub struct OpenAiCompletionClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    pub fn new(settings: &RewriteSettings) -> Result<Self, RewriteError> {
        Self::with_endpoint(
            &settings.base_url,
            settings.api_key.clone(),
            settings.model.clone(),
            settings.request_timeout,
        )
    }

    /// `base_url` is the API root; `/chat/completions` is appended
    pub fn with_endpoint(
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, RewriteError> {
        if !is_valid_value(base_url) {
            return Err(RewriteError::Config("rewrite base URL is empty".to_string()));
        }
        if !is_valid_value(&api_key) {
            return Err(RewriteError::Config("rewrite API key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RewriteError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RewriteError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
        };

        debug!(model = %self.model, messages = messages.len(), "Requesting completion");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RewriteError::Api(status.as_u16(), error_text));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| RewriteError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(RewriteError::EmptyResponse)
    }
}

/// Prompt-driven rewrite and chat over a [`CompletionBackend`]
pub struct RewriteClient {
    backend: Arc<dyn CompletionBackend>,
}

impl RewriteClient {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Rewrite `text` following `prompt`; the reply is returned verbatim
    pub async fn rewrite(&self, text: &str, prompt: &str) -> Result<String, RewriteError> {
        if !is_valid_value(prompt) {
            return Err(RewriteError::InvalidInput("prompt is required".to_string()));
        }
        if !is_valid_value(text) {
            return Err(RewriteError::InvalidInput("text is required".to_string()));
        }

        let messages = [
            ChatMessage::system(REWRITE_SYSTEM_PROMPT),
            ChatMessage::user(format!("{}\n\n{}", prompt.trim(), text)),
        ];

        let rewritten = self.backend.complete(&messages).await?;
        info!(
            input_chars = text.len(),
            output_chars = rewritten.len(),
            "Text rewritten"
        );
        Ok(rewritten)
    }

    /// Ask the assistant, continuing `history`
    ///
    /// The persona system message is added when the history does not already
    /// start with one. The returned history includes the new exchange.
    pub async fn chat(
        &self,
        prompt: &str,
        mut history: Vec<ChatMessage>,
    ) -> Result<ChatReply, RewriteError> {
        if !is_valid_value(prompt) {
            return Err(RewriteError::InvalidInput("prompt is required".to_string()));
        }

        if history.first().map(|m| m.role) != Some(ChatRole::System) {
            history.insert(0, ChatMessage::system(CHAT_SYSTEM_PROMPT));
        }
        history.push(ChatMessage::user(prompt));

        let response = self.backend.complete(&history).await?;
        history.push(ChatMessage::assistant(response.clone()));

        Ok(ChatReply { response, history })
    }
}

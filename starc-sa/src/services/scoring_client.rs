//! Scoring endpoint client
//!
//! Outbound transport to the externally-hosted sentiment/FLS scoring service.
//!
//! Wire contract:
//! - `POST <base_url>?apikey=<key>` with `Content-Type: application/json`
//! - optional `Authorization: Bearer <token>`
//! - body `{"text": "..."}` or `{"texts": ["...", "..."]}`
//! - response: `{"tone": {...}, "fls": {...}}`, or an array of such objects
//!   when a pair was submitted
//!
//! The pipeline only depends on the [`ScoringBackend`] trait, so tests and
//! alternative transports can be substituted.

use crate::types::{ScoreRequest, SentenceScore};
use async_trait::async_trait;
use serde_json::Value;
use starc_common::config::{is_valid_value, ScoringSettings};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USER_AGENT: &str = concat!("starc-sa/", env!("CARGO_PKG_VERSION"));

/// Per-request scoring errors
///
/// None of these are fatal to a scoring call; they only remove a data point.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ScoringError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScoringError::Timeout
        } else if e.is_decode() {
            ScoringError::Parse(e.to_string())
        } else {
            ScoringError::Network(e.to_string())
        }
    }
}

/// Transport seam between the pipeline and the scoring service
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Send one scoring request
    ///
    /// Returns the JSON body of a success response. Non-success status,
    /// transport failure and unparseable bodies are all errors.
    async fn post(&self, request: &ScoreRequest) -> Result<Value, ScoringError>;
}

/// reqwest-backed scoring client
pub struct HttpScoringClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    bearer_token: Option<String>,
}

impl HttpScoringClient {
    /// Build a client from resolved settings
    ///
    /// An empty URL or API key is a configuration error.
    pub fn new(settings: &ScoringSettings) -> Result<Self, ScoringError> {
        Self::with_endpoint(
            settings.base_url.clone(),
            settings.api_key.clone(),
            settings.bearer_token.clone(),
            settings.request_timeout,
        )
    }

    pub fn with_endpoint(
        base_url: String,
        api_key: String,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ScoringError> {
        if !is_valid_value(&base_url) {
            return Err(ScoringError::Config("scoring base URL is empty".to_string()));
        }
        if !is_valid_value(&api_key) {
            return Err(ScoringError::Config("scoring API key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ScoringError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
            bearer_token: bearer_token.filter(|t| is_valid_value(t)),
        })
    }
}

#[async_trait]
impl ScoringBackend for HttpScoringClient {
    async fn post(&self, request: &ScoreRequest) -> Result<Value, ScoringError> {
        let mut builder = self
            .http_client
            .post(&self.base_url)
            .query(&[("apikey", self.api_key.as_str())])
            .json(request);

        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScoringError::Status(status.as_u16(), error_text));
        }

        let body = response.text().await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|e| ScoringError::Parse(e.to_string()))?;

        debug!(sentences = request.sentence_count(), "Scoring request succeeded");
        Ok(value)
    }
}

/// Send one request, racing the caller's cancellation token
///
/// A cancelled request is abandoned and reported as [`ScoringError::Cancelled`].
pub async fn send_cancellable(
    backend: &dyn ScoringBackend,
    request: &ScoreRequest,
    cancel: &CancellationToken,
) -> Result<Value, ScoringError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScoringError::Cancelled),
        result = backend.post(request) => result,
    }
}

// ============================================================================
// Response decoding
// ============================================================================

/// Decode a scoring response body into per-sentence scores
///
/// An object decodes to one score; an array decodes element-wise and fails
/// if any element fails.
pub fn decode_scores(value: Value) -> Result<Vec<SentenceScore>, ScoringError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(decode_one)
            .collect::<Result<Vec<_>, _>>(),
        other => decode_one(other).map(|score| vec![score]),
    }
}

fn decode_one(value: Value) -> Result<SentenceScore, ScoringError> {
    if !is_valid_probe_response(&value) {
        return Err(ScoringError::Parse(
            "response missing 'tone' or 'fls' object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| ScoringError::Parse(e.to_string()))
}

/// Shape check used for warmup probes: top-level `tone` and `fls` objects
pub fn is_valid_probe_response(value: &Value) -> bool {
    value.get("tone").is_some_and(Value::is_object)
        && value.get("fls").is_some_and(Value::is_object)
}

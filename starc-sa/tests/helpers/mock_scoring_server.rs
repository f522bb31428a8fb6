//! Mock scoring service
//!
//! Speaks the scoring wire contract on an ephemeral localhost port:
//! `POST /score?apikey=...` with `{"text"}` or `{"texts"}`, answering with a
//! tone/fls object (or an array of them for pairs).
//!
//! Sentence text drives the response:
//! - contains a `fail_on` marker: the whole request answers 500
//! - contains a `garble_on` marker: the body is not JSON
//! - contains a `negative_on` marker: negative / non-specific
//! - anything else: positive / specific

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_BEARER_TOKEN: &str = "test-bearer";

#[derive(Default)]
struct ServerState {
    fail_on: Vec<String>,
    garble_on: Vec<String>,
    negative_on: Vec<String>,
    delay: Duration,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

/// Builder for [`MockScoringServer`]
#[derive(Default)]
pub struct MockScoringServerBuilder {
    state: ServerState,
}

impl MockScoringServerBuilder {
    pub fn fail_on(mut self, marker: &str) -> Self {
        self.state.fail_on.push(marker.to_string());
        self
    }

    pub fn garble_on(mut self, marker: &str) -> Self {
        self.state.garble_on.push(marker.to_string());
        self
    }

    pub fn negative_on(mut self, marker: &str) -> Self {
        self.state.negative_on.push(marker.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.state.delay = delay;
        self
    }

    pub async fn start(self) -> MockScoringServer {
        let state = Arc::new(self.state);
        let app = Router::new()
            .route("/score", post(handle_score))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind mock scoring server");
        let addr = listener.local_addr().expect("Should have local address");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        MockScoringServer {
            url: format!("http://{}/score", addr),
            state,
        }
    }
}

/// Running mock scoring service
pub struct MockScoringServer {
    pub url: String,
    state: Arc<ServerState>,
}

impl MockScoringServer {
    pub fn builder() -> MockScoringServerBuilder {
        MockScoringServerBuilder::default()
    }

    /// Server answering every well-formed request positively
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    /// Requests that passed the credential checks
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Request bodies in arrival order
    pub fn bodies(&self) -> Vec<Value> {
        self.state.bodies.lock().unwrap().clone()
    }
}

fn sentence_score(state: &ServerState, text: &str) -> Value {
    if state.negative_on.iter().any(|m| text.contains(m.as_str())) {
        json!({
            "tone": {"Positive": 0.0, "Neutral": 0.0, "Negative": 1.0},
            "fls": {"Specific FLS": 0.0, "Non-specific FLS": 1.0, "Not FLS": 0.0}
        })
    } else {
        json!({
            "tone": {"Positive": 1.0, "Neutral": 0.0, "Negative": 0.0},
            "fls": {"Specific FLS": 1.0, "Non-specific FLS": 0.0, "Not FLS": 0.0}
        })
    }
}

fn texts_of(body: &Value) -> Option<Vec<String>> {
    if let Some(text) = body.get("text").and_then(Value::as_str) {
        return Some(vec![text.to_string()]);
    }
    body.get("texts")?
        .as_array()?
        .iter()
        .map(|t| t.as_str().map(String::from))
        .collect()
}

async fn handle_score(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if query.get("apikey").map(String::as_str) != Some(TEST_API_KEY) {
        return (StatusCode::UNAUTHORIZED, "bad api key").into_response();
    }
    let expected_auth = format!("Bearer {}", TEST_BEARER_TOKEN);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if auth.is_some() && auth != Some(expected_auth.as_str()) {
        return (StatusCode::FORBIDDEN, "bad bearer token").into_response();
    }

    state.requests.fetch_add(1, Ordering::SeqCst);
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    state.bodies.lock().unwrap().push(body.clone());

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    let Some(texts) = texts_of(&body) else {
        return (StatusCode::BAD_REQUEST, "missing text").into_response();
    };
    let has = |markers: &[String]| {
        texts
            .iter()
            .any(|t| markers.iter().any(|m| t.contains(m.as_str())))
    };

    if has(&state.fail_on) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    }
    if has(&state.garble_on) {
        return (StatusCode::OK, "<html>gateway</html>").into_response();
    }

    if body.get("texts").is_some() {
        let scores: Vec<Value> = texts.iter().map(|t| sentence_score(&state, t)).collect();
        Json(Value::Array(scores)).into_response()
    } else {
        Json(sentence_score(&state, &texts[0])).into_response()
    }
}

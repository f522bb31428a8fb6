//! Mock OpenAI-compatible chat completions service
//!
//! `POST /v1/chat/completions` with `Authorization: Bearer sk-test` answers
//! with a fixed reply, or 503 when built with [`MockCompletionServer::failing`].

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const TEST_COMPLETION_KEY: &str = "sk-test";

struct ServerState {
    reply: Option<String>,
    requests: Mutex<Vec<Value>>,
}

/// Running mock completion service
pub struct MockCompletionServer {
    /// API root to configure the client with (`.../v1`)
    pub base_url: String,
    state: Arc<ServerState>,
}

impl MockCompletionServer {
    pub async fn replying(reply: &str) -> Self {
        Self::start(Some(reply.to_string())).await
    }

    pub async fn failing() -> Self {
        Self::start(None).await
    }

    async fn start(reply: Option<String>) -> Self {
        let state = Arc::new(ServerState {
            reply,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/v1/chat/completions", post(handle_completion))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind mock completion server");
        let addr = listener.local_addr().expect("Should have local address");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}/v1", addr),
            state,
        }
    }

    /// Request bodies in arrival order
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn handle_completion(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let expected = format!("Bearer {}", TEST_COMPLETION_KEY);
    if headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        != Some(expected.as_str())
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "invalid api key"}})),
        )
            .into_response();
    }

    state.requests.lock().unwrap().push(body);

    match &state.reply {
        Some(reply) => Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": reply},
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": {"message": "overloaded"}})),
        )
            .into_response(),
    }
}

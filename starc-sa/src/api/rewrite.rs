//! Rewrite and chat pass-through endpoints

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::{ChatMessage, ChatReply};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RewriteBody {
    pub text: String,
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub rewritten_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// POST /rewrite
pub async fn rewrite_text(
    State(state): State<AppState>,
    Json(body): Json<RewriteBody>,
) -> ApiResult<Json<RewriteResponse>> {
    let rewritten_text = state.rewriter.rewrite(&body.text, &body.prompt).await?;
    Ok(Json(RewriteResponse { rewritten_text }))
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> ApiResult<Json<ChatReply>> {
    let reply = state.rewriter.chat(&body.prompt, body.history).await?;
    Ok(Json(reply))
}

/// Build rewrite routes
pub fn rewrite_routes() -> Router<AppState> {
    Router::new()
        .route("/rewrite", post(rewrite_text))
        .route("/chat", post(chat))
}

//! Scoring endpoints
//!
//! - `POST /score` - score a text block
//! - `POST /analyze` - score, rewrite, and re-score a text block
//! - `POST /warmup` - run the warmup gate on demand

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiResult;
use crate::services::{DocumentAnalysis, PoolSnapshot, ScoringReport};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ScoreBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub text: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WarmupResponse {
    pub warm: bool,
    pub pool: PoolSnapshot,
}

/// POST /score
///
/// Always answers 200 for a well-formed body; an unscorable text yields the
/// neutral default score.
pub async fn score_text(
    State(state): State<AppState>,
    Json(body): Json<ScoreBody>,
) -> Json<ScoringReport> {
    debug!(chars = body.text.len(), "Score request");
    let cancel = state.shutdown.child_token();
    Json(state.scorer.score_detailed(&cancel, &body.text).await)
}

/// POST /analyze
pub async fn analyze_text(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> ApiResult<Json<DocumentAnalysis>> {
    let cancel = state.shutdown.child_token();
    let analysis = state
        .analyzer
        .analyze(&cancel, &body.text, body.prompt.as_deref())
        .await?;
    Ok(Json(analysis))
}

/// POST /warmup
pub async fn trigger_warmup(State(state): State<AppState>) -> Json<WarmupResponse> {
    let cancel = state.shutdown.child_token();
    let warmup = state.scorer.warmup();
    let warm = warmup.ensure_warm(&cancel).await;
    Json(WarmupResponse {
        warm,
        pool: warmup.snapshot(),
    })
}

/// Build scoring routes
pub fn score_routes() -> Router<AppState> {
    Router::new()
        .route("/score", post(score_text))
        .route("/analyze", post(analyze_text))
        .route("/warmup", post(trigger_warmup))
}

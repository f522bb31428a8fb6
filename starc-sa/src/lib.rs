//! starc-sa library - concurrent sentiment/FLS scoring pipeline
//!
//! Turns free text into a four-number quality score (overall, optimism,
//! confidence, specific FLS) by fanning requests out to an externally-hosted
//! scoring pool that is kept warm between calls.
//!
//! Exposes public APIs for the server binary, the benchmark, and integration
//! tests.

pub mod api;
pub mod bench;
pub mod error;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};
pub use crate::types::{AggregateScore, SentenceScore};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::services::{
    BatchScorer, CompletionBackend, DocumentAnalyzer, RewriteClient, ScoringBackend,
    WarmupCoordinator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Scoring pipeline (owns the warmup coordinator)
    pub scorer: Arc<BatchScorer>,
    pub analyzer: Arc<DocumentAnalyzer>,
    pub rewriter: Arc<RewriteClient>,
    /// Cancelled on graceful shutdown; requests use child tokens
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the pipeline over the given transports
    ///
    /// `warmup` must probe the same scoring backend.
    pub fn new(
        scoring: Arc<dyn ScoringBackend>,
        completion: Arc<dyn CompletionBackend>,
        warmup: Arc<WarmupCoordinator>,
    ) -> Self {
        let scorer = Arc::new(BatchScorer::new(scoring, warmup));
        let rewriter = Arc::new(RewriteClient::new(completion));
        let analyzer = Arc::new(DocumentAnalyzer::new(
            Arc::clone(&scorer),
            Arc::clone(&rewriter),
        ));

        Self {
            scorer,
            analyzer,
            rewriter,
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::score_routes())
        .merge(api::rewrite_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

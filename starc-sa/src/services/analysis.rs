//! Document analysis: score, rewrite, re-score
//!
//! Mirrors what the document workflow needs when text is submitted: the score
//! of the original text, a rewritten version, and the score of the rewrite.
//! Scoring never fails, so only the rewrite can turn this into an error.

use crate::services::batch_scorer::BatchScorer;
use crate::services::rewrite_client::{RewriteClient, RewriteError};
use crate::types::AggregateScore;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Prompt used when the caller does not supply one
pub const DEFAULT_REWRITE_PROMPT: &str = "Rewrite this text to be clearer and more confident, \
and make any forward-looking statements specific.";

#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub original_text: String,
    pub rewritten_text: String,
    pub original_word_count: usize,
    pub rewritten_word_count: usize,
    pub original_score: AggregateScore,
    pub rewritten_score: AggregateScore,
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub struct DocumentAnalyzer {
    scorer: Arc<BatchScorer>,
    rewriter: Arc<RewriteClient>,
}

impl DocumentAnalyzer {
    pub fn new(scorer: Arc<BatchScorer>, rewriter: Arc<RewriteClient>) -> Self {
        Self { scorer, rewriter }
    }

    /// Score the original, rewrite it, then score the rewrite
    ///
    /// The two scoring calls run one after the other so the pool width bound
    /// holds for the whole analysis.
    pub async fn analyze(
        &self,
        cancel: &CancellationToken,
        text: &str,
        prompt: Option<&str>,
    ) -> Result<DocumentAnalysis, RewriteError> {
        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_REWRITE_PROMPT);

        let original_score = self.scorer.score(cancel, text).await;
        let rewritten_text = self.rewriter.rewrite(text, prompt).await?;
        let rewritten_score = self.scorer.score(cancel, &rewritten_text).await;

        info!(
            original_overall = original_score.overall,
            rewritten_overall = rewritten_score.overall,
            "Document analyzed"
        );

        Ok(DocumentAnalysis {
            original_word_count: word_count(text),
            rewritten_word_count: word_count(&rewritten_text),
            original_text: text.to_string(),
            rewritten_text,
            original_score,
            rewritten_score,
        })
    }
}

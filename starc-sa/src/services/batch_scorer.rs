//! Batched concurrent scoring
//!
//! Turns a block of text into an [`AggregateScore`]:
//!
//! 1. Split into sentences on `.`
//! 2. Best-effort warm the pool
//! 3. Walk the sentences in chunks of `2 × max_instances`. Each chunk becomes
//!    one round of pair/single requests, padded with filler requests to exactly
//!    `max_instances` so the backend sees constant concurrency
//! 4. Keep only genuine responses and aggregate them
//!
//! Rounds run sequentially, so at most `max_instances` requests are ever in
//! flight. No error escapes: failed requests are missing data points, and if
//! nothing survives the caller gets [`AggregateScore::NEUTRAL_DEFAULT`].

use crate::services::aggregator::aggregate;
use crate::services::scoring_client::{decode_scores, send_cancellable, ScoringBackend, ScoringError};
use crate::services::warmup::WarmupCoordinator;
use crate::types::{AggregateScore, ScoreRequest, SentenceScore};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Placeholder payload for filler requests
pub const FILLER_TEXT: &str = "This is a placeholder sentence.";

/// Sentences carried by one real request
pub const SENTENCES_PER_REQUEST: usize = 2;

/// Split text into sentence units: split on '.', trim, drop empties
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Group sentences into pair requests in order; an odd tail becomes a single
pub fn group_requests(sentences: &[String]) -> Vec<ScoreRequest> {
    sentences
        .chunks(SENTENCES_PER_REQUEST)
        .filter_map(|group| match group {
            [first, second] => Some(ScoreRequest::pair(first.as_str(), second.as_str())),
            [only] => Some(ScoreRequest::single(only.as_str())),
            _ => None,
        })
        .collect()
}

/// Filler requests needed to pad a round to the pool width (never negative)
pub fn filler_count(num_real: usize, max_instances: usize) -> usize {
    max_instances.saturating_sub(num_real)
}

/// Score plus bookkeeping for one scoring call
#[derive(Debug, Clone, Serialize)]
pub struct ScoringReport {
    pub score: AggregateScore,
    pub sentences_found: usize,
    pub sentences_scored: usize,
    pub requests_sent: usize,
    pub fillers_sent: usize,
    pub requests_failed: usize,
    pub rounds: usize,
    /// Whether the pool was confirmed warm before scoring started
    pub pool_warm: bool,
}

impl ScoringReport {
    fn empty() -> Self {
        Self {
            score: AggregateScore::NEUTRAL_DEFAULT,
            sentences_found: 0,
            sentences_scored: 0,
            requests_sent: 0,
            fillers_sent: 0,
            requests_failed: 0,
            rounds: 0,
            pool_warm: false,
        }
    }

    /// True when the score is the neutral fallback rather than real data
    pub fn is_fallback(&self) -> bool {
        self.sentences_scored == 0
    }
}

/// Result of one dispatch round
#[derive(Debug, Default)]
struct RoundOutcome {
    scores: Vec<SentenceScore>,
    real_sent: usize,
    real_failed: usize,
    fillers_sent: usize,
    fillers_ok: usize,
}

impl RoundOutcome {
    fn any_success(&self) -> bool {
        self.real_sent > self.real_failed || self.fillers_ok > 0
    }
}

/// Text → [`AggregateScore`] pipeline over a warm-managed scoring pool
pub struct BatchScorer {
    backend: Arc<dyn ScoringBackend>,
    warmup: Arc<WarmupCoordinator>,
}

impl BatchScorer {
    /// The pool width is taken from the coordinator
    pub fn new(backend: Arc<dyn ScoringBackend>, warmup: Arc<WarmupCoordinator>) -> Self {
        Self { backend, warmup }
    }

    pub fn warmup(&self) -> &Arc<WarmupCoordinator> {
        &self.warmup
    }

    pub fn max_instances(&self) -> usize {
        self.warmup.max_instances()
    }

    /// Score `text`; never fails
    pub async fn score(&self, cancel: &CancellationToken, text: &str) -> AggregateScore {
        self.score_detailed(cancel, text).await.score
    }

    /// Score `text` and report how the score was obtained
    pub async fn score_detailed(&self, cancel: &CancellationToken, text: &str) -> ScoringReport {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            debug!("No sentences to score, returning neutral default");
            return ScoringReport::empty();
        }

        let pool_warm = self.warmup.ensure_warm(cancel).await;
        if !pool_warm {
            warn!("Scoring pool warmup failed, scoring against a possibly cold pool");
        }

        let max_instances = self.max_instances();
        let chunk_size = max_instances.saturating_mul(SENTENCES_PER_REQUEST);

        let mut report = ScoringReport {
            sentences_found: sentences.len(),
            pool_warm,
            ..ScoringReport::empty()
        };
        let mut collected = Vec::with_capacity(sentences.len());

        for (round, chunk) in sentences.chunks(chunk_size).enumerate() {
            let outcome = self.dispatch_round(cancel, chunk).await;

            debug!(
                round,
                real = outcome.real_sent,
                fillers = outcome.fillers_sent,
                failed = outcome.real_failed,
                "Scoring round settled"
            );

            if outcome.any_success() {
                self.warmup.update_activity().await;
            }

            report.rounds += 1;
            report.requests_sent += outcome.real_sent;
            report.fillers_sent += outcome.fillers_sent;
            report.requests_failed += outcome.real_failed;
            collected.extend(outcome.scores);
        }

        report.sentences_scored = collected.len();
        report.score = match aggregate(&collected) {
            Some(score) => score,
            None => {
                warn!(
                    sentences = report.sentences_found,
                    "Every scoring request failed, returning neutral default"
                );
                AggregateScore::NEUTRAL_DEFAULT
            }
        };

        info!(
            sentences = report.sentences_found,
            scored = report.sentences_scored,
            rounds = report.rounds,
            failed = report.requests_failed,
            overall = report.score.overall,
            "Text scored"
        );
        report
    }

    /// Send one padded round and wait for every request to settle
    async fn dispatch_round(&self, cancel: &CancellationToken, chunk: &[String]) -> RoundOutcome {
        let real = group_requests(chunk);
        let num_real = real.len();
        let num_fillers = filler_count(num_real, self.max_instances());
        let filler = ScoreRequest::single(FILLER_TEXT);

        let backend = self.backend.as_ref();
        let requests = real
            .iter()
            .chain(std::iter::repeat(&filler).take(num_fillers))
            .map(|request| send_cancellable(backend, request, cancel));

        let mut responses = join_all(requests).await;
        let filler_responses = responses.split_off(num_real);

        let mut outcome = RoundOutcome {
            real_sent: num_real,
            fillers_sent: num_fillers,
            fillers_ok: filler_responses.iter().filter(|r| r.is_ok()).count(),
            ..RoundOutcome::default()
        };

        for (index, (request, response)) in real.iter().zip(responses).enumerate() {
            match response.and_then(|body| decode_for(request, body)) {
                Ok(scores) => outcome.scores.extend(scores),
                Err(e) => {
                    outcome.real_failed += 1;
                    warn!(request = index, error = %e, "Scoring request dropped");
                }
            }
        }

        outcome
    }
}

/// Decode a response, rejecting more scores than sentences sent
fn decode_for(
    request: &ScoreRequest,
    body: serde_json::Value,
) -> Result<Vec<SentenceScore>, ScoringError> {
    let scores = decode_scores(body)?;
    if scores.is_empty() || scores.len() > request.sentence_count() {
        return Err(ScoringError::Parse(format!(
            "expected up to {} scores, got {}",
            request.sentence_count(),
            scores.len()
        )));
    }
    Ok(scores)
}

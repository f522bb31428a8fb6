//! Scoring latency measurement
//!
//! Support code for the `score-bench` binary: time forced warmups, then time
//! scoring calls for increasing sentence counts to see where the padded
//! rounds stop being flat.

use crate::services::{BatchScorer, WarmupCoordinator};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Build a text of exactly `count` sentences by cycling through `sentences`
pub fn build_test_text(sentences: &[String], count: usize) -> String {
    if sentences.is_empty() || count == 0 {
        return String::new();
    }
    let picked: Vec<&str> = sentences
        .iter()
        .cycle()
        .take(count)
        .map(String::as_str)
        .collect();
    format!("{}.", picked.join(". "))
}

/// Timing for one sentence count
#[derive(Debug, Clone, Serialize)]
pub struct LatencyStats {
    pub sentence_count: usize,
    pub runs: usize,
    pub times_secs: Vec<f64>,
    pub avg_secs: f64,
    pub avg_per_sentence_secs: f64,
    /// Runs that fell back to the neutral default
    pub fallback_runs: usize,
}

impl LatencyStats {
    pub fn from_times(sentence_count: usize, times: &[Duration], fallback_runs: usize) -> Self {
        let times_secs: Vec<f64> = times.iter().map(Duration::as_secs_f64).collect();
        let avg_secs = if times_secs.is_empty() {
            0.0
        } else {
            times_secs.iter().sum::<f64>() / times_secs.len() as f64
        };
        let avg_per_sentence_secs = if sentence_count == 0 {
            0.0
        } else {
            avg_secs / sentence_count as f64
        };

        Self {
            sentence_count,
            runs: times_secs.len(),
            times_secs,
            avg_secs,
            avg_per_sentence_secs,
            fallback_runs,
        }
    }
}

/// Full benchmark output
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResults {
    pub sentences_in_sample: usize,
    pub warmup_times_secs: Vec<f64>,
    pub warmup_avg_secs: f64,
    pub results: Vec<LatencyStats>,
}

impl BenchmarkResults {
    pub fn new(sentences_in_sample: usize, warmup_times: &[Duration]) -> Self {
        let warmup = LatencyStats::from_times(1, warmup_times, 0);
        Self {
            sentences_in_sample,
            warmup_times_secs: warmup.times_secs,
            warmup_avg_secs: warmup.avg_secs,
            results: Vec::new(),
        }
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Serialize benchmark results")?;
        std::fs::write(path, json)
            .with_context(|| format!("Write benchmark results to {}", path.display()))?;
        Ok(())
    }
}

/// Time `attempts` forced warmups, pausing `cooldown` between them
pub async fn measure_warmup(
    warmup: &WarmupCoordinator,
    attempts: usize,
    cooldown: Duration,
    cancel: &CancellationToken,
) -> Vec<Duration> {
    let mut times = Vec::with_capacity(attempts);

    for attempt in 0..attempts {
        let start = Instant::now();
        let successes = warmup.force_warmup(cancel).await;
        let elapsed = start.elapsed();
        info!(
            attempt = attempt + 1,
            successes,
            secs = elapsed.as_secs_f64(),
            "Warmup attempt"
        );
        times.push(elapsed);

        if attempt + 1 < attempts && !cooldown.is_zero() {
            tokio::time::sleep(cooldown).await;
        }
    }

    times
}

/// Time `runs` scoring calls on a text of `count` sentences
pub async fn measure_scoring_latency(
    scorer: &BatchScorer,
    sentences: &[String],
    count: usize,
    runs: usize,
    pause: Duration,
    cancel: &CancellationToken,
) -> LatencyStats {
    let text = build_test_text(sentences, count);
    let mut times = Vec::with_capacity(runs);
    let mut fallback_runs = 0;

    for run in 0..runs {
        let start = Instant::now();
        let report = scorer.score_detailed(cancel, &text).await;
        let elapsed = start.elapsed();

        if report.is_fallback() {
            fallback_runs += 1;
        }
        info!(
            sentences = count,
            run = run + 1,
            secs = elapsed.as_secs_f64(),
            "Scoring run"
        );
        times.push(elapsed);

        if run + 1 < runs && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    LatencyStats::from_times(count, &times, fallback_runs)
}

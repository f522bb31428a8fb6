//! Scoring latency benchmark
//!
//! Measures warmup duration and end-to-end scoring latency against the
//! configured scoring endpoint for a range of sentence counts.
//!
//! **Usage:**
//! ```bash
//! score-bench --sample sample.txt [--min 1] [--max 25] [--runs 5] [--export results.json]
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use starc_common::config::{default_config_path, load_toml_config, ScoringSettings, TomlConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use starc_sa::bench::{measure_scoring_latency, measure_warmup, BenchmarkResults};
use starc_sa::services::batch_scorer::split_sentences;
use starc_sa::services::{BatchScorer, HttpScoringClient, ScoringBackend, WarmupCoordinator};

/// Scoring latency benchmark
#[derive(Parser, Debug)]
#[command(name = "score-bench")]
#[command(about = "Measure warmup and scoring latency against the scoring pool")]
struct Args {
    /// Sample text file; sentences are cycled to build each test text
    #[arg(long, value_name = "FILE")]
    sample: PathBuf,

    /// Path to TOML config file
    #[arg(short, long, env = "STARC_CONFIG")]
    config: Option<PathBuf>,

    /// Smallest sentence count to test
    #[arg(long, default_value = "1")]
    min: usize,

    /// Largest sentence count to test
    #[arg(long, default_value = "25")]
    max: usize,

    /// Timed runs per sentence count
    #[arg(long, default_value = "5")]
    runs: usize,

    /// Forced warmup attempts to time
    #[arg(long, default_value = "3")]
    warmup_attempts: usize,

    /// Seconds to pause between runs
    #[arg(long, default_value = "5")]
    pause_secs: u64,

    /// Export results to JSON file
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    starc_common::logging::init_tracing("info");
    let args = Args::parse();

    if args.min == 0 || args.min > args.max {
        bail!("--min must be at least 1 and not greater than --max");
    }

    let config = match args.config.clone().or_else(default_config_path) {
        Some(path) => load_toml_config(&path)?,
        None => TomlConfig::default(),
    };
    let settings = ScoringSettings::resolve(&config).context("Scoring configuration invalid")?;

    let sample = std::fs::read_to_string(&args.sample)
        .with_context(|| format!("Read sample text {}", args.sample.display()))?;
    let sentences = split_sentences(&sample);
    if sentences.is_empty() {
        bail!("Sample text contains no sentences");
    }
    info!("Found {} sentences in sample text", sentences.len());

    let backend: Arc<dyn ScoringBackend> = Arc::new(HttpScoringClient::new(&settings)?);
    let warmup = Arc::new(WarmupCoordinator::from_settings(Arc::clone(&backend), &settings));
    let scorer = BatchScorer::new(backend, Arc::clone(&warmup));
    let cancel = CancellationToken::new();
    let pause = Duration::from_secs(args.pause_secs);

    let warmup_times = measure_warmup(&warmup, args.warmup_attempts, pause, &cancel).await;
    let mut results = BenchmarkResults::new(sentences.len(), &warmup_times);
    println!("\nAverage warmup: {:.2}s", results.warmup_avg_secs);

    for count in args.min..=args.max {
        let stats =
            measure_scoring_latency(&scorer, &sentences, count, args.runs, pause, &cancel).await;
        println!(
            "{:>3} sentences: avg {:.2}s, per sentence {:.3}s{}",
            count,
            stats.avg_secs,
            stats.avg_per_sentence_secs,
            if stats.fallback_runs > 0 {
                format!(" ({} runs fell back to default)", stats.fallback_runs)
            } else {
                String::new()
            }
        );
        results.results.push(stats);
    }

    if let Some(path) = args.export {
        results.export_json(&path)?;
        println!("\n✓ Results exported to: {}", path.display());
    }

    Ok(())
}

//! starc-sa - Sentiment/FLS scoring microservice
//!
//! Scores text against an externally-hosted scoring pool, keeps that pool
//! warm, and passes rewrite/chat calls through to a text-generation service.
//!
//! Configuration: `--config` (or `<config_dir>/starc/starc-sa.toml`), with
//! `STARC_*` environment variables taking priority over the file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use starc_common::config::{
    default_config_path, load_toml_config, resolve_bind, resolve_log_level, RewriteSettings,
    ScoringSettings, TomlConfig,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use starc_sa::services::{
    HttpScoringClient, OpenAiCompletionClient, ScoringBackend, WarmupCoordinator,
};
use starc_sa::AppState;

/// Command-line arguments for starc-sa
#[derive(Parser, Debug)]
#[command(name = "starc-sa")]
#[command(about = "Sentiment and forward-looking statement scoring service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "STARC_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides STARC_BIND and [server].bind)
    #[arg(short, long)]
    bind: Option<String>,

    /// Skip the warmup fan-out at startup
    #[arg(long)]
    no_startup_warmup: bool,
}

fn load_config(path: Option<PathBuf>) -> Result<TomlConfig> {
    match path.or_else(default_config_path) {
        Some(path) => Ok(load_toml_config(&path)?),
        None => Ok(TomlConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.clone())?;
    starc_common::logging::init_tracing(&resolve_log_level(&config));

    // Build identification immediately after tracing init
    info!(
        "Starting STARC scoring service (starc-sa) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Missing endpoints or credentials abort startup
    let scoring_settings =
        ScoringSettings::resolve(&config).context("Scoring configuration invalid")?;
    let rewrite_settings =
        RewriteSettings::resolve(&config).context("Rewrite configuration invalid")?;

    let scoring_client =
        HttpScoringClient::new(&scoring_settings).context("Failed to create scoring client")?;
    let completion_client = OpenAiCompletionClient::new(&rewrite_settings)
        .context("Failed to create rewrite client")?;

    let scoring: Arc<dyn ScoringBackend> = Arc::new(scoring_client);
    let warmup = Arc::new(WarmupCoordinator::from_settings(
        Arc::clone(&scoring),
        &scoring_settings,
    ));
    let state = AppState::new(scoring, Arc::new(completion_client), warmup);
    let shutdown = state.shutdown.clone();

    if !args.no_startup_warmup {
        let warmup = Arc::clone(state.scorer.warmup());
        let cancel = shutdown.child_token();
        tokio::spawn(async move {
            if !warmup.ensure_warm(&cancel).await {
                warn!("Startup warmup failed, first scoring call may be slow");
            }
        });
    }

    let app = starc_sa::build_router(state);

    let bind = resolve_bind(args.bind.as_deref(), &config);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C / SIGTERM, then cancel in-flight outbound requests
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

//! Tracing subscriber bootstrap shared by all STARC binaries

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. "info" or
/// "starc_sa=debug,tower_http=info") is used as the filter directive.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedded use) is not an error worth failing on
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

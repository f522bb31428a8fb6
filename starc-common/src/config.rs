//! Configuration loading and settings resolution
//!
//! Settings are resolved in priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! 3. Compiled default (where one exists)
//!
//! Credentials and endpoint URLs have no compiled default. Missing values are
//! reported as [`Error::Config`] so the service refuses to start instead of
//! running without a backend.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of concurrent scoring requests per round (pool width)
pub const DEFAULT_MAX_INSTANCES: usize = 20;
/// Largest accepted pool width
pub const MAX_POOL_INSTANCES: usize = 1024;
/// Default minimum time between warmup fan-outs
pub const DEFAULT_WARMUP_INTERVAL_SECS: u64 = 600;
/// Default per-request timeout for outbound calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default OpenAI-compatible endpoint for rewrite and chat
pub const DEFAULT_REWRITE_URL: &str = "https://api.openai.com/v1";
/// Default text-generation model
pub const DEFAULT_REWRITE_MODEL: &str = "gpt-3.5-turbo";
/// Default HTTP listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:2000";
/// Default tracing level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable names
pub mod env_vars {
    pub const SCORING_URL: &str = "STARC_SCORING_URL";
    pub const SCORING_API_KEY: &str = "STARC_SCORING_API_KEY";
    pub const SCORING_BEARER_TOKEN: &str = "STARC_SCORING_BEARER_TOKEN";
    pub const MAX_INSTANCES: &str = "STARC_MAX_INSTANCES";
    pub const WARMUP_INTERVAL_SECS: &str = "STARC_WARMUP_INTERVAL_SECS";
    pub const REQUEST_TIMEOUT_SECS: &str = "STARC_REQUEST_TIMEOUT_SECS";
    pub const REWRITE_URL: &str = "STARC_REWRITE_URL";
    pub const REWRITE_API_KEY: &str = "STARC_REWRITE_API_KEY";
    pub const REWRITE_MODEL: &str = "STARC_REWRITE_MODEL";
    pub const LOG_LEVEL: &str = "STARC_LOG_LEVEL";
    pub const BIND: &str = "STARC_BIND";
}

// ============================================================================
// TOML model
// ============================================================================

/// Contents of `starc-sa.toml`
///
/// Every section is optional; a missing file is equivalent to an empty one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub scoring: ScoringSection,
    pub rewrite: RewriteSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. "0.0.0.0:2000"
    pub bind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// `[scoring]` section: the externally-hosted scoring endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub max_instances: Option<usize>,
    pub warmup_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// `[rewrite]` section: the text-generation endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RewriteSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// Platform config file location: `<config_dir>/starc/starc-sa.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("starc").join("starc-sa.toml"))
}

/// Load TOML config from `path`
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. A file that exists but cannot be parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

// ============================================================================
// Resolution helpers
// ============================================================================

/// Non-empty, non-whitespace check used for keys and URLs
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| is_valid_value(v))
}

/// ENV value if set, else TOML value if valid
fn resolve_string(env_name: &str, toml_value: Option<&String>) -> Option<String> {
    if let Some(value) = env_value(env_name) {
        debug!(setting = env_name, "Resolved from environment");
        return Some(value);
    }
    toml_value
        .map(|v| v.trim().to_string())
        .filter(|v| is_valid_value(v))
}

fn resolve_number<T>(env_name: &str, toml_value: Option<T>, default: T) -> Result<T>
where
    T: FromStr + Copy,
{
    match env_value(env_name) {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            Error::Config(format!("{} must be a non-negative integer, got '{}'", env_name, raw))
        }),
        None => Ok(toml_value.unwrap_or(default)),
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Fully resolved scoring endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSettings {
    pub base_url: String,
    pub api_key: String,
    pub bearer_token: Option<String>,
    pub max_instances: usize,
    pub warmup_interval: Duration,
    pub request_timeout: Duration,
}

impl ScoringSettings {
    /// Resolve from ENV → TOML → defaults
    pub fn resolve(toml: &TomlConfig) -> Result<Self> {
        let section = &toml.scoring;

        let base_url = resolve_string(env_vars::SCORING_URL, section.base_url.as_ref())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Scoring endpoint URL not configured. Set {} or [scoring].base_url",
                    env_vars::SCORING_URL
                ))
            })?;

        let api_key = resolve_string(env_vars::SCORING_API_KEY, section.api_key.as_ref())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Scoring API key not configured. Set {} or [scoring].api_key",
                    env_vars::SCORING_API_KEY
                ))
            })?;

        let bearer_token =
            resolve_string(env_vars::SCORING_BEARER_TOKEN, section.bearer_token.as_ref());

        let max_instances = resolve_number(
            env_vars::MAX_INSTANCES,
            section.max_instances,
            DEFAULT_MAX_INSTANCES,
        )?;
        let warmup_secs = resolve_number(
            env_vars::WARMUP_INTERVAL_SECS,
            section.warmup_interval_secs,
            DEFAULT_WARMUP_INTERVAL_SECS,
        )?;
        let timeout_secs = resolve_number(
            env_vars::REQUEST_TIMEOUT_SECS,
            section.request_timeout_secs,
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        let settings = Self {
            base_url,
            api_key,
            bearer_token,
            max_instances,
            warmup_interval: Duration::from_secs(warmup_secs),
            request_timeout: Duration::from_secs(timeout_secs),
        };
        settings.validate()?;

        info!(
            max_instances = settings.max_instances,
            warmup_interval_secs = warmup_secs,
            "Scoring settings resolved"
        );
        Ok(settings)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !is_valid_value(&self.base_url) {
            return Err(Error::Config("Scoring endpoint URL is empty".to_string()));
        }
        if !is_valid_value(&self.api_key) {
            return Err(Error::Config("Scoring API key is empty".to_string()));
        }
        if self.max_instances == 0 || self.max_instances > MAX_POOL_INSTANCES {
            return Err(Error::Config(format!(
                "max_instances must be between 1 and {}, got {}",
                MAX_POOL_INSTANCES, self.max_instances
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be at least 1 second".to_string()));
        }
        Ok(())
    }
}

/// Fully resolved rewrite/chat endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl RewriteSettings {
    /// Resolve from ENV → TOML → defaults
    pub fn resolve(toml: &TomlConfig) -> Result<Self> {
        let section = &toml.rewrite;

        let base_url = resolve_string(env_vars::REWRITE_URL, section.base_url.as_ref())
            .unwrap_or_else(|| DEFAULT_REWRITE_URL.to_string());

        let api_key = resolve_string(env_vars::REWRITE_API_KEY, section.api_key.as_ref())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Rewrite API key not configured. Set {} or [rewrite].api_key",
                    env_vars::REWRITE_API_KEY
                ))
            })?;

        let model = resolve_string(env_vars::REWRITE_MODEL, section.model.as_ref())
            .unwrap_or_else(|| DEFAULT_REWRITE_MODEL.to_string());

        let timeout_secs = resolve_number(
            env_vars::REQUEST_TIMEOUT_SECS,
            section.request_timeout_secs,
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(Error::Config("request timeout must be at least 1 second".to_string()));
        }

        info!(model = %model, "Rewrite settings resolved");
        Ok(Self {
            base_url,
            api_key,
            model,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Resolve listen address: CLI → ENV → TOML → default
pub fn resolve_bind(cli_arg: Option<&str>, toml: &TomlConfig) -> String {
    if let Some(bind) = cli_arg.filter(|b| is_valid_value(b)) {
        return bind.to_string();
    }
    resolve_string(env_vars::BIND, toml.server.bind.as_ref())
        .unwrap_or_else(|| DEFAULT_BIND.to_string())
}

/// Resolve tracing level: ENV → TOML (which carries its own default)
pub fn resolve_log_level(toml: &TomlConfig) -> String {
    resolve_string(env_vars::LOG_LEVEL, Some(&toml.logging.level))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

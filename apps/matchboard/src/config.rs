use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::events::{StrongMatchPolicy, DEFAULT_STRONG_MATCH_THRESHOLD};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub strong_match_threshold: u8,
    pub strong_match_policy: StrongMatchPolicy,
    pub poll_interval: Duration,
    pub explain_timeout: Duration,
    pub notification_page_size: usize,
    /// Offline template generator is used when unset.
    pub anthropic_api_key: Option<String>,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("./data"),
            strong_match_threshold: DEFAULT_STRONG_MATCH_THRESHOLD,
            strong_match_policy: StrongMatchPolicy::Once,
            poll_interval: Duration::from_secs(180),
            explain_timeout: Duration::from_secs(10),
            notification_page_size: 20,
            anthropic_api_key: None,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let strong_match_threshold: u8 = parse_or(
            var("STRONG_MATCH_THRESHOLD"),
            "STRONG_MATCH_THRESHOLD",
            defaults.strong_match_threshold,
        )?;
        if strong_match_threshold > 100 {
            bail!("STRONG_MATCH_THRESHOLD must be between 0 and 100, got {strong_match_threshold}");
        }

        let refire: bool = parse_or(var("STRONG_MATCH_REFIRE"), "STRONG_MATCH_REFIRE", false)?;
        let strong_match_policy = if refire {
            StrongMatchPolicy::OnScoreChange
        } else {
            StrongMatchPolicy::Once
        };

        let poll_secs: u64 = parse_or(var("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS", 180)?;
        if poll_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be greater than 0");
        }
        let explain_secs: u64 = parse_or(var("EXPLAIN_TIMEOUT_SECS"), "EXPLAIN_TIMEOUT_SECS", 10)?;

        let notification_page_size: usize = parse_or(
            var("NOTIFICATION_PAGE_SIZE"),
            "NOTIFICATION_PAGE_SIZE",
            defaults.notification_page_size,
        )?;
        if notification_page_size == 0 {
            bail!("NOTIFICATION_PAGE_SIZE must be greater than 0");
        }

        Ok(Config {
            data_dir: var("MATCHBOARD_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            strong_match_threshold,
            strong_match_policy,
            poll_interval: Duration::from_secs(poll_secs),
            explain_timeout: Duration::from_secs(explain_secs),
            notification_page_size,
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            rust_log: var("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{value}'")),
        None => Ok(default),
    }
}

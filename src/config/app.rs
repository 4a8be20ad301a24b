// src/config/app.rs
//! Process configuration, read from the environment (after `.env` in dev).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::analyze::ScoringFormula;
use crate::brokerage_weights::ENV_BROKERAGE_WEIGHTS_PATH;
use crate::error::ConfigError;
use crate::ingest::RetryPolicy;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://ratings.db?mode=rwc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Feed endpoint (`API_URL`).
    pub api_url: String,
    /// Bearer credential for the feed (`API_KEY`).
    pub api_key: String,
    pub database_url: String,
    pub scoring_formula: ScoringFormula,
    /// Size of the recent-activity pool the ranking draws from.
    pub recommendation_window: usize,
    /// Default top-N when a request doesn't say.
    pub recommendation_limit: usize,
    pub retry: RetryPolicy,
    /// `None` = sync once at startup.
    pub sync_interval: Option<Duration>,
    pub feed_timeout: Duration,
    pub brokerage_weights_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = get("API_URL").ok_or(ConfigError::Missing("API_URL"))?;
        let api_key = get("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "API_URL",
                value: api_url,
            });
        }

        let scoring_formula = match get("SCORING_FORMULA") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                key: "SCORING_FORMULA",
                value: v,
            })?,
            None => ScoringFormula::Plain,
        };

        let retry = RetryPolicy {
            max_attempts: parse_or(get("SYNC_MAX_ATTEMPTS"), "SYNC_MAX_ATTEMPTS", 3u32)?.max(1),
            backoff_unit: Duration::from_millis(parse_or(
                get("SYNC_BACKOFF_MS"),
                "SYNC_BACKOFF_MS",
                1_000u64,
            )?),
        };

        let interval_secs: u64 = parse_or(get("SYNC_INTERVAL_SECS"), "SYNC_INTERVAL_SECS", 0)?;

        Ok(Self {
            api_url,
            api_key,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            scoring_formula,
            recommendation_window: parse_or(
                get("RECOMMENDATION_WINDOW"),
                "RECOMMENDATION_WINDOW",
                100,
            )?,
            recommendation_limit: parse_or(get("RECOMMENDATION_LIMIT"), "RECOMMENDATION_LIMIT", 5)?,
            retry,
            sync_interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
            feed_timeout: Duration::from_secs(parse_or(
                get("FEED_TIMEOUT_SECS"),
                "FEED_TIMEOUT_SECS",
                10u64,
            )?),
            brokerage_weights_path: get(ENV_BROKERAGE_WEIGHTS_PATH).map(PathBuf::from),
        })
    }
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
        None => Ok(default),
    }
}

//! Error taxonomy shared by the ingest path, the stores and the scorer.
//!
//! Item-level failures (`ParseError`, non-`NotFound` `StoreError`) are logged
//! and skipped by the sync loop; `FetchError` is retried per page. Only
//! `ConfigError` is fatal, and only at startup.

use thiserror::Error;

/// Malformed price or timestamp text on a single feed item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty price")]
    EmptyPrice,

    #[error("invalid price '{0}'")]
    InvalidPrice(String),

    #[error("negative price '{0}'")]
    NegativePrice(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("missing ticker")]
    MissingTicker,

    #[error("{field}: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Tag an error with the DTO field it came from.
    pub fn in_field(self, field: &'static str) -> Self {
        ParseError::Field {
            field,
            source: Box::new(self),
        }
    }
}

/// Transient upstream failure while fetching one page.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("feed transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned status {0}")]
    Status(u16),

    #[error("feed response could not be decoded: {0}")]
    Decode(String),

    #[error("feed unavailable: {0}")]
    Unavailable(String),
}

/// Storage failures. `NotFound` is an expected signal, never a degradation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate record for {ticker} at {time}")]
    Duplicate { ticker: String, time: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Events that cannot be scored; the ranking sinks them instead of failing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("target_from is zero for {ticker}; price impact is undefined")]
    ZeroBaseline { ticker: String },

    #[error("price impact for {ticker} is out of decimal range")]
    Overflow { ticker: String },
}

/// Startup misconfiguration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

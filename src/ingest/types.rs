// src/ingest/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{FetchError, ParseError};
use crate::ingest::parse::{parse_price, parse_timestamp};

/// One analyst action on a ticker. Identity is `(ticker, time)`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RatingEvent {
    /// Storage id; `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub ticker: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub brokerage: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub rating_from: String,
    #[serde(default)]
    pub rating_to: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub target_from: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub target_to: Decimal,
    pub time: DateTime<Utc>,
}

impl RatingEvent {
    /// Dedup key.
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (self.ticker.as_str(), self.time)
    }
}

/// A feed item exactly as it arrives on the wire: every field is text.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RatingDto {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub target_from: String,
    #[serde(default)]
    pub target_to: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub brokerage: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub rating_from: String,
    #[serde(default)]
    pub rating_to: String,
    #[serde(default)]
    pub time: String,
}

impl TryFrom<RatingDto> for RatingEvent {
    type Error = ParseError;

    fn try_from(dto: RatingDto) -> Result<Self, Self::Error> {
        let ticker = dto.ticker.trim().to_string();
        if ticker.is_empty() {
            return Err(ParseError::MissingTicker);
        }
        let target_from = parse_price(&dto.target_from).map_err(|e| e.in_field("target_from"))?;
        let target_to = parse_price(&dto.target_to).map_err(|e| e.in_field("target_to"))?;
        let time = parse_timestamp(&dto.time).map_err(|e| e.in_field("time"))?;

        Ok(RatingEvent {
            id: None,
            ticker,
            company: dto.company,
            brokerage: dto.brokerage,
            action: dto.action,
            rating_from: dto.rating_from,
            rating_to: dto.rating_to,
            target_from,
            target_to,
            time,
        })
    }
}

/// One page of the upstream feed. An empty `next_page` ends the stream.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<RatingDto>,
    #[serde(default)]
    pub next_page: String,
}

/// Paginated source of rating actions.
#[async_trait::async_trait]
pub trait RatingFeed: Send + Sync {
    /// Fetch the page addressed by `cursor`; the empty cursor is the first page.
    async fn fetch_page(&self, cursor: &str) -> Result<FeedPage, FetchError>;
    fn name(&self) -> &'static str;
}

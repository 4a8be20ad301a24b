// src/ingest/parse.rs
//! Normalization of the text fields the feed sends for prices and timestamps.

use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;

use crate::error::ParseError;

/// Parse a price such as `"$1,234.56"` or `" 250.75 "`.
///
/// Surrounding whitespace, one leading `$` and every `,` thousands separator
/// are stripped; what remains must be a plain non-negative decimal.
pub fn parse_price(text: &str) -> Result<Decimal, ParseError> {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let cleaned: String = unsigned.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(ParseError::EmptyPrice);
    }
    // Decimal::from_str is lenient about a few layouts we never see on the wire.
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
    {
        return Err(ParseError::InvalidPrice(text.to_string()));
    }

    let value =
        Decimal::from_str(cleaned).map_err(|_| ParseError::InvalidPrice(text.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ParseError::NegativePrice(text.to_string()));
    }
    Ok(value)
}

/// Parse an RFC 3339 date-time with offset and normalize it to UTC.
///
/// Sub-microsecond digits are dropped: storage keys events by microsecond.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(6))
        .map_err(|_| ParseError::InvalidTimestamp(text.to_string()))
}

//! Storage port for rating events plus its two adapters.
//!
//! The sync loop and the recommendation path depend only on [`RatingStore`];
//! the binary wires [`sqlite::SqliteRatingStore`], tests mostly use
//! [`memory::MemoryRatingStore`].

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::ingest::types::RatingEvent;

pub use memory::MemoryRatingStore;
pub use sqlite::SqliteRatingStore;

#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Dedup lookup. `Err(StoreError::NotFound)` when nothing matches.
    async fn find_by_ticker_and_time(
        &self,
        ticker: &str,
        time: DateTime<Utc>,
    ) -> Result<RatingEvent, StoreError>;

    /// Most recent event for `ticker`.
    async fn find_by_ticker(&self, ticker: &str) -> Result<RatingEvent, StoreError>;

    /// Persist `event` and return its id. A second event with the same
    /// `(ticker, time)` is rejected with `StoreError::Duplicate`.
    async fn insert(&self, event: &RatingEvent) -> Result<i64, StoreError>;

    /// Up to `limit` events, newest first.
    async fn recent_window(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError>;

    /// Up to `limit` events with the highest `target_to`.
    async fn top_by_target_price(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError>;

    /// Insertion-ordered page.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RatingEvent>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

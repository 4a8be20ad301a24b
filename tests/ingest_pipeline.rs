// tests/ingest_pipeline.rs
use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use analyst_ratings_recommender::error::StoreError;
use analyst_ratings_recommender::ingest::providers::scripted::ScriptedFeed;
use analyst_ratings_recommender::ingest::types::{RatingDto, RatingEvent};
use analyst_ratings_recommender::ingest::{run_full_sync, RetryPolicy};
use analyst_ratings_recommender::store::{MemoryRatingStore, RatingStore};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff_unit: Duration::ZERO,
    }
}

fn dto(ticker: &str, time: &str) -> RatingDto {
    RatingDto {
        ticker: ticker.into(),
        target_from: "$100.00".into(),
        target_to: "$120.00".into(),
        company: format!("{ticker} Inc."),
        brokerage: "The Goldman Sachs Group".into(),
        action: "upgraded by".into(),
        rating_from: "Neutral".into(),
        rating_to: "Buy".into(),
        time: time.into(),
    }
}

fn feed_pages() -> Vec<Vec<RatingDto>> {
    vec![
        vec![
            dto("TSLA", "2024-06-01T12:00:00Z"),
            dto("AAPL", "2024-06-01T13:00:00Z"),
        ],
        vec![
            dto("MSFT", "2024-06-02T09:30:00Z"),
            // same fact repeated on a later page
            dto("TSLA", "2024-06-01T12:00:00Z"),
        ],
        vec![dto("TSLA", "2024-06-03T08:00:00Z")],
    ]
}

fn keys(events: &[RatingEvent]) -> BTreeSet<(String, DateTime<Utc>)> {
    events.iter().map(|e| (e.ticker.clone(), e.time)).collect()
}

#[tokio::test]
async fn follows_cursors_until_empty() {
    let feed = ScriptedFeed::from_pages(feed_pages());
    let store = MemoryRatingStore::new();

    let report = run_full_sync(&feed, &store, &fast_retry()).await;

    assert_eq!(feed.requested_cursors(), ["", "p2", "p3"]);
    assert_eq!(report.pages, 3);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.inserted, 4);
    assert_eq!(report.duplicates, 1);
    assert!(!report.truncated);
    assert_eq!(store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn rerunning_sync_never_duplicates() {
    let store = MemoryRatingStore::new();

    let first = run_full_sync(
        &ScriptedFeed::from_pages(feed_pages()),
        &store,
        &fast_retry(),
    )
    .await;
    let after_one = store.snapshot();

    let second = run_full_sync(
        &ScriptedFeed::from_pages(feed_pages()),
        &store,
        &fast_retry(),
    )
    .await;
    let after_two = store.snapshot();

    assert_eq!(first.inserted, 4);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 5);
    assert_eq!(after_one, after_two);
    assert_eq!(keys(&after_two).len(), after_two.len());
}

#[tokio::test]
async fn unparsable_items_are_skipped_not_fatal() {
    let mut bad_price = dto("BAD", "2024-06-01T12:00:00Z");
    bad_price.target_to = "1.2.3".into();
    let date_only = dto("DATE", "2024-06-01");
    let no_ticker = dto("", "2024-06-01T12:00:00Z");

    let feed = ScriptedFeed::from_pages(vec![vec![
        bad_price,
        dto("GOOD", "2024-06-01T12:00:00Z"),
        date_only,
        no_ticker,
    ]]);
    let store = MemoryRatingStore::new();

    let report = run_full_sync(&feed, &store, &fast_retry()).await;

    assert_eq!(report.parse_errors, 3);
    assert_eq!(report.inserted, 1);
    assert_eq!(store.snapshot()[0].ticker, "GOOD");
}

/// Delegates to memory, but fails lookups for `LOOKUP` and inserts for `INSERT`.
struct FlakyStore {
    inner: MemoryRatingStore,
}

#[async_trait]
impl RatingStore for FlakyStore {
    async fn find_by_ticker_and_time(
        &self,
        ticker: &str,
        time: DateTime<Utc>,
    ) -> Result<RatingEvent, StoreError> {
        if ticker == "LOOKUP" {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.find_by_ticker_and_time(ticker, time).await
    }

    async fn find_by_ticker(&self, ticker: &str) -> Result<RatingEvent, StoreError> {
        self.inner.find_by_ticker(ticker).await
    }

    async fn insert(&self, event: &RatingEvent) -> Result<i64, StoreError> {
        if event.ticker == "INSERT" {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.inner.insert(event).await
    }

    async fn recent_window(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError> {
        self.inner.recent_window(limit).await
    }

    async fn top_by_target_price(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError> {
        self.inner.top_by_target_price(limit).await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RatingEvent>, StoreError> {
        self.inner.list(limit, offset).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }
}

#[tokio::test]
async fn storage_errors_skip_the_item_and_keep_paginating() {
    let feed = ScriptedFeed::from_pages(vec![
        vec![
            dto("LOOKUP", "2024-06-01T12:00:00Z"),
            dto("INSERT", "2024-06-01T12:00:00Z"),
            dto("OK1", "2024-06-01T12:00:00Z"),
        ],
        vec![dto("OK2", "2024-06-01T12:00:00Z")],
    ]);
    let store = FlakyStore {
        inner: MemoryRatingStore::new(),
    };

    let report = run_full_sync(&feed, &store, &fast_retry()).await;

    assert_eq!(report.lookup_errors, 1);
    assert_eq!(report.insert_errors, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.pages, 2);
    let tickers: Vec<_> = store
        .inner
        .snapshot()
        .into_iter()
        .map(|e| e.ticker)
        .collect();
    assert_eq!(tickers, ["OK1", "OK2"]);
}

#[tokio::test]
async fn empty_feed_is_a_clean_run() {
    let feed = ScriptedFeed::from_pages(vec![vec![]]);
    let store = MemoryRatingStore::new();
    let report = run_full_sync(&feed, &store, &fast_retry()).await;
    assert_eq!(report.pages, 1);
    assert_eq!(report.inserted, 0);
    assert!(!report.truncated);
}

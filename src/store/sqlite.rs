// src/store/sqlite.rs
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::RatingStore;
use crate::error::StoreError;
use crate::ingest::types::RatingEvent;

const SELECT_COLUMNS: &str = "SELECT id, ticker, company, brokerage, action, rating_from, \
     rating_to, target_from, target_to, event_time FROM rating_events";

/// SQLite-backed store. Prices are kept as decimal text, times as UTC
/// microseconds; `(ticker, event_time)` carries a unique index.
pub struct SqliteRatingStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: i64,
    ticker: String,
    company: String,
    brokerage: String,
    action: String,
    rating_from: String,
    rating_to: String,
    target_from: String,
    target_to: String,
    event_time: i64,
}

impl TryFrom<RatingRow> for RatingEvent {
    type Error = StoreError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt { id: row.id, reason };
        let target_from = Decimal::from_str(&row.target_from)
            .map_err(|e| corrupt(format!("target_from: {e}")))?;
        let target_to =
            Decimal::from_str(&row.target_to).map_err(|e| corrupt(format!("target_to: {e}")))?;
        let time = DateTime::<Utc>::from_timestamp_micros(row.event_time)
            .ok_or_else(|| corrupt(format!("event_time out of range: {}", row.event_time)))?;

        Ok(RatingEvent {
            id: Some(row.id),
            ticker: row.ticker,
            company: row.company,
            brokerage: row.brokerage,
            action: row.action,
            rating_from: row.rating_from,
            rating_to: row.rating_to,
            target_from,
            target_to,
            time,
        })
    }
}

fn rows_to_events(rows: Vec<RatingRow>) -> Result<Vec<RatingEvent>, StoreError> {
    rows.into_iter().map(RatingEvent::try_from).collect()
}

fn clamp_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl SqliteRatingStore {
    /// Connect to `url` (e.g. `sqlite://ratings.db?mode=rwc` or `sqlite::memory:`)
    /// and create the schema if needed.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every in-memory connection is its own database; pin the pool to one.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!(target: "store", url, "sqlite store opened");
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rating_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                company TEXT NOT NULL DEFAULT '',
                brokerage TEXT NOT NULL DEFAULT '',
                action TEXT NOT NULL DEFAULT '',
                rating_from TEXT NOT NULL DEFAULT '',
                rating_to TEXT NOT NULL DEFAULT '',
                target_from TEXT NOT NULL,
                target_to TEXT NOT NULL,
                event_time INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_rating_events_ticker_time
             ON rating_events (ticker, event_time)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_rating_events_time ON rating_events (event_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the pool; call once at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(target: "store", "sqlite store closed");
    }
}

#[async_trait]
impl RatingStore for SqliteRatingStore {
    async fn find_by_ticker_and_time(
        &self,
        ticker: &str,
        time: DateTime<Utc>,
    ) -> Result<RatingEvent, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE ticker = ? AND event_time = ? LIMIT 1");
        let row = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(ticker)
            .bind(time.timestamp_micros())
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn find_by_ticker(&self, ticker: &str) -> Result<RatingEvent, StoreError> {
        let sql =
            format!("{SELECT_COLUMNS} WHERE ticker = ? ORDER BY event_time DESC, id DESC LIMIT 1");
        let row = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn insert(&self, event: &RatingEvent) -> Result<i64, StoreError> {
        let res = sqlx::query(
            "INSERT INTO rating_events (
                ticker, company, brokerage, action, rating_from, rating_to,
                target_from, target_to, event_time, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.ticker)
        .bind(&event.company)
        .bind(&event.brokerage)
        .bind(&event.action)
        .bind(&event.rating_from)
        .bind(&event.rating_to)
        .bind(event.target_from.to_string())
        .bind(event.target_to.to_string())
        .bind(event.time.timestamp_micros())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await;

        match res {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(e)
                if e.as_database_error()
                    .is_some_and(|d| d.is_unique_violation()) =>
            {
                Err(StoreError::Duplicate {
                    ticker: event.ticker.clone(),
                    time: event.time.to_rfc3339(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recent_window(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY event_time DESC, id DESC LIMIT ?");
        let rows = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(clamp_i64(limit))
            .fetch_all(&self.pool)
            .await?;
        rows_to_events(rows)
    }

    async fn top_by_target_price(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError> {
        let sql =
            format!("{SELECT_COLUMNS} ORDER BY CAST(target_to AS REAL) DESC, id ASC LIMIT ?");
        let rows = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(clamp_i64(limit))
            .fetch_all(&self.pool)
            .await?;
        rows_to_events(rows)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RatingEvent>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC LIMIT ? OFFSET ?");
        let rows = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(clamp_i64(limit))
            .bind(clamp_i64(offset))
            .fetch_all(&self.pool)
            .await?;
        rows_to_events(rows)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rating_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

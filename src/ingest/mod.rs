// src/ingest/mod.rs
pub mod parse;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::types::{FeedPage, RatingDto, RatingEvent, RatingFeed};
use crate::store::RatingStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_runs_total", "Full sync runs started.");
        describe_counter!("sync_pages_total", "Feed pages fetched successfully.");
        describe_counter!("sync_inserted_total", "Rating events inserted into storage.");
        describe_counter!(
            "sync_duplicates_total",
            "Rating events skipped because (ticker, time) was already stored."
        );
        describe_counter!(
            "sync_item_errors_total",
            "Items skipped because of parse, lookup or insert errors."
        );
        describe_counter!("sync_fetch_failures_total", "Failed page fetch attempts.");
        describe_counter!(
            "sync_truncated_total",
            "Runs that stopped paginating before the feed reported its end."
        );
        describe_histogram!("feed_fetch_ms", "Feed page fetch time in milliseconds.");
        describe_gauge!("sync_last_run_ts", "Unix ts when the last sync finished.");
    });
}

/// Per-page fetch retry: attempt `n` that fails waits `n * backoff_unit`
/// before attempt `n + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

/// Outcome counters of one full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    pub pages: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub parse_errors: usize,
    pub lookup_errors: usize,
    pub insert_errors: usize,
    /// Pagination stopped early (retries exhausted or a repeated cursor).
    pub truncated: bool,
}

impl SyncReport {
    pub fn item_errors(&self) -> usize {
        self.parse_errors + self.lookup_errors + self.insert_errors
    }
}

enum ItemOutcome {
    Inserted,
    Duplicate,
    ParseFailed,
    LookupFailed,
    InsertFailed,
}

/// Pull every page of `feed` into `store`, skipping events already stored.
///
/// Never fails: item errors are counted and skipped, and a page whose
/// retries are exhausted ends the run early with `truncated = true`.
/// Safe to re-run from scratch at any time.
pub async fn run_full_sync(
    feed: &dyn RatingFeed,
    store: &dyn RatingStore,
    retry: &RetryPolicy,
) -> SyncReport {
    ensure_metrics_described();
    counter!("sync_runs_total").increment(1);
    tracing::info!(target: "sync", feed = feed.name(), "full sync started");

    let mut report = SyncReport::default();
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut cursor = String::new();

    loop {
        let Some(page) = fetch_with_retry(feed, &cursor, retry).await else {
            tracing::warn!(
                target: "sync",
                cursor = %cursor,
                attempts = retry.max_attempts,
                "page fetch retries exhausted; treating feed as ended"
            );
            mark_truncated(&mut report);
            break;
        };

        report.pages += 1;
        report.fetched += page.items.len();
        counter!("sync_pages_total").increment(1);

        for dto in page.items {
            match process_item(store, dto).await {
                ItemOutcome::Inserted => report.inserted += 1,
                ItemOutcome::Duplicate => report.duplicates += 1,
                ItemOutcome::ParseFailed => report.parse_errors += 1,
                ItemOutcome::LookupFailed => report.lookup_errors += 1,
                ItemOutcome::InsertFailed => report.insert_errors += 1,
            }
        }

        if page.next_page.is_empty() {
            break;
        }
        if !seen_cursors.insert(page.next_page.clone()) {
            tracing::warn!(
                target: "sync",
                cursor = %page.next_page,
                "feed repeated a cursor; stopping pagination"
            );
            mark_truncated(&mut report);
            break;
        }
        cursor = page.next_page;
    }

    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("sync_last_run_ts").set(now as f64);

    tracing::info!(
        target: "sync",
        pages = report.pages,
        inserted = report.inserted,
        duplicates = report.duplicates,
        item_errors = report.item_errors(),
        truncated = report.truncated,
        "full sync finished"
    );
    report
}

fn mark_truncated(report: &mut SyncReport) {
    report.truncated = true;
    counter!("sync_truncated_total").increment(1);
}

async fn fetch_with_retry(
    feed: &dyn RatingFeed,
    cursor: &str,
    retry: &RetryPolicy,
) -> Option<FeedPage> {
    let attempts = retry.max_attempts.max(1);
    for attempt in 1..=attempts {
        let t0 = Instant::now();
        let res = feed.fetch_page(cursor).await;
        histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(page) => return Some(page),
            Err(e) => {
                counter!("sync_fetch_failures_total").increment(1);
                tracing::warn!(
                    target: "sync",
                    error = %e,
                    cursor = %cursor,
                    attempt,
                    max_attempts = attempts,
                    "page fetch failed"
                );
                if attempt < attempts {
                    tokio::time::sleep(retry.backoff_after(attempt)).await;
                }
            }
        }
    }
    None
}

async fn process_item(store: &dyn RatingStore, dto: RatingDto) -> ItemOutcome {
    let raw_ticker = dto.ticker.clone();
    let event = match RatingEvent::try_from(dto) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::warn!(target: "sync", ticker = %raw_ticker, error = %e, "skipping unparsable item");
            counter!("sync_item_errors_total", "kind" => "parse").increment(1);
            return ItemOutcome::ParseFailed;
        }
    };

    match store.find_by_ticker_and_time(&event.ticker, event.time).await {
        Ok(_) => {
            tracing::debug!(target: "sync", ticker = %event.ticker, time = %event.time, "already stored; skipping");
            counter!("sync_duplicates_total").increment(1);
            return ItemOutcome::Duplicate;
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => {
            tracing::warn!(target: "sync", ticker = %event.ticker, error = %e, "dedup lookup failed; skipping item");
            counter!("sync_item_errors_total", "kind" => "lookup").increment(1);
            return ItemOutcome::LookupFailed;
        }
    }

    match store.insert(&event).await {
        Ok(id) => {
            tracing::debug!(target: "sync", ticker = %event.ticker, id, "inserted");
            counter!("sync_inserted_total").increment(1);
            ItemOutcome::Inserted
        }
        Err(e) => {
            tracing::warn!(target: "sync", ticker = %event.ticker, error = %e, "insert failed");
            counter!("sync_item_errors_total", "kind" => "insert").increment(1);
            ItemOutcome::InsertFailed
        }
    }
}

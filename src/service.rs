//! `RatingsService`: the operations the HTTP layer (and the scheduler) call.
//!
//! Owns the storage and feed ports plus the scorer; holds no other state, so
//! a single instance is shared behind an `Arc` for the process lifetime.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use metrics::{counter, gauge};

use crate::analyze::{top_n, ScoredCandidate, Scorer};
use crate::error::StoreError;
use crate::ingest::types::{RatingEvent, RatingFeed};
use crate::ingest::{run_full_sync, RetryPolicy, SyncReport};
use crate::store::RatingStore;

pub const DEFAULT_RECOMMENDATION_WINDOW: usize = 100;

pub struct RatingsService {
    store: Arc<dyn RatingStore>,
    feed: Arc<dyn RatingFeed>,
    scorer: Scorer,
    retry: RetryPolicy,
    window: usize,
    /// Held for the whole of a sync so scheduled and manual runs queue up.
    sync_lock: tokio::sync::Mutex<()>,
}

impl RatingsService {
    pub fn new(store: Arc<dyn RatingStore>, feed: Arc<dyn RatingFeed>, scorer: Scorer) -> Self {
        Self {
            store,
            feed,
            scorer,
            retry: RetryPolicy::default(),
            window: DEFAULT_RECOMMENDATION_WINDOW,
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Size of the recent-activity pool ranked by [`Self::top_recommendations`].
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn store(&self) -> &Arc<dyn RatingStore> {
        &self.store
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Pull the whole feed into storage. See [`run_full_sync`].
    /// A call made while another run is in progress waits for it to finish.
    pub async fn run_full_sync(&self) -> SyncReport {
        let _running = self.sync_lock.lock().await;
        run_full_sync(self.feed.as_ref(), self.store.as_ref(), &self.retry).await
    }

    /// Best `n` events of the recent window, as of now.
    pub async fn top_recommendations(&self, n: usize) -> Result<Vec<RatingEvent>, StoreError> {
        self.top_recommendations_at(n, Utc::now()).await
    }

    /// Same as [`Self::top_recommendations`] with an explicit clock.
    pub async fn top_recommendations_at(
        &self,
        n: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RatingEvent>, StoreError> {
        Ok(self
            .scored_recommendations_at(n, now)
            .await?
            .into_iter()
            .map(|c| c.event)
            .collect())
    }

    pub async fn scored_recommendations_at(
        &self,
        n: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        counter!("recommend_requests_total").increment(1);
        let pool = self.store.recent_window(self.window).await?;
        gauge!("recommend_window_size").set(pool.len() as f64);
        tracing::debug!(pool = pool.len(), n, formula = ?self.scorer.formula(), "ranking");
        Ok(top_n(pool, n, &self.scorer, now))
    }

    /// Events with the highest price target; the ranking without scoring.
    pub async fn top_by_target_price(&self, n: usize) -> Result<Vec<RatingEvent>, StoreError> {
        self.store.top_by_target_price(n).await
    }

    /// Most recent event for `ticker`; `StoreError::NotFound` if none.
    pub async fn get_by_ticker(&self, ticker: &str) -> Result<RatingEvent, StoreError> {
        self.store.find_by_ticker(ticker.trim()).await
    }

    pub async fn list_paged(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RatingEvent>, StoreError> {
        self.store.list(limit, offset).await
    }

    /// Manual insert with the same dedup rule as the sync loop.
    pub async fn add_event(&self, mut event: RatingEvent) -> Result<RatingEvent, StoreError> {
        event.ticker = event.ticker.trim().to_string();
        event.time = event.time.trunc_subsecs(6);
        match self
            .store
            .find_by_ticker_and_time(&event.ticker, event.time)
            .await
        {
            Ok(_) => {
                return Err(StoreError::Duplicate {
                    ticker: event.ticker,
                    time: event.time.to_rfc3339(),
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        let id = self.store.insert(&event).await?;
        event.id = Some(id);
        tracing::info!(ticker = %event.ticker, id, "event added");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::providers::scripted::ScriptedFeed;
    use crate::store::MemoryRatingStore;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ev(ticker: &str) -> RatingEvent {
        RatingEvent {
            id: None,
            ticker: ticker.into(),
            company: String::new(),
            brokerage: "JP Morgan".into(),
            action: String::new(),
            rating_from: "Neutral".into(),
            rating_to: "Buy".into(),
            target_from: Decimal::from(100),
            target_to: Decimal::from(120),
            time: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn service(store: Arc<MemoryRatingStore>) -> RatingsService {
        RatingsService::new(store, Arc::new(ScriptedFeed::new(vec![])), Scorer::default())
    }

    #[tokio::test]
    async fn add_event_assigns_id_and_rejects_duplicates() {
        let store = Arc::new(MemoryRatingStore::new());
        let svc = service(store.clone());

        let added = svc.add_event(ev("AAPL")).await.unwrap();
        assert_eq!(added.id, Some(1));
        let dup = svc.add_event(ev("AAPL")).await.unwrap_err();
        assert!(matches!(dup, StoreError::Duplicate { .. }));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn unknown_ticker_is_not_found() {
        let svc = service(Arc::new(MemoryRatingStore::new()));
        let err = svc.get_by_ticker("UNKNOWN").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn window_bounds_the_ranking_pool() {
        let mut old = ev("OLD");
        old.target_to = Decimal::from(500);
        old.time = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let store = Arc::new(MemoryRatingStore::with_events(vec![old, ev("NEW")]));
        let svc = service(store).with_window(1);

        let top = svc.top_recommendations(5).await.unwrap();
        let tickers: Vec<_> = top.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(tickers, ["NEW"]);
    }

    #[tokio::test]
    async fn add_event_keys_by_microsecond() {
        let store = Arc::new(MemoryRatingStore::new());
        let svc = service(store.clone());

        let mut a = ev("AAPL");
        a.time += chrono::Duration::nanoseconds(123_456_001);
        let mut b = ev("AAPL");
        b.time += chrono::Duration::nanoseconds(123_456_999);

        let added = svc.add_event(a).await.unwrap();
        assert_eq!(added.time.timestamp_subsec_nanos(), 123_456_000);
        assert!(matches!(
            svc.add_event(b).await,
            Err(StoreError::Duplicate { .. })
        ));
    }

    /// Feed that records how many fetches are in flight at once.
    struct SlowFeed {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RatingFeed for SlowFeed {
        async fn fetch_page(
            &self,
            _cursor: &str,
        ) -> Result<crate::ingest::types::FeedPage, crate::error::FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Default::default())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_syncs_run_one_at_a_time() {
        let feed = Arc::new(SlowFeed {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let svc = RatingsService::new(
            Arc::new(MemoryRatingStore::new()),
            feed.clone(),
            Scorer::default(),
        );

        let (a, b) = tokio::join!(svc.run_full_sync(), svc.run_full_sync());

        assert_eq!(a.pages, 1);
        assert_eq!(b.pages, 1);
        assert_eq!(feed.peak.load(Ordering::SeqCst), 1);
    }
}

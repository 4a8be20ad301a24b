// src/store/memory.rs
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RatingStore;
use crate::error::StoreError;
use crate::ingest::types::RatingEvent;

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<RatingEvent>,
    next_id: i64,
}

/// Mutex-guarded in-process store with the same contract as the SQLite one.
#[derive(Debug, Default)]
pub struct MemoryRatingStore {
    inner: Mutex<Inner>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store directly; ids are assigned in order.
    pub fn with_events(events: Vec<RatingEvent>) -> Self {
        let rows = events
            .into_iter()
            .enumerate()
            .map(|(i, mut ev)| {
                ev.id = Some(i as i64 + 1);
                ev
            })
            .collect::<Vec<_>>();
        let next_id = rows.len() as i64;
        Self {
            inner: Mutex::new(Inner { rows, next_id }),
        }
    }

    /// Copy of every stored event in insertion order.
    pub fn snapshot(&self) -> Vec<RatingEvent> {
        self.inner.lock().expect("store mutex poisoned").rows.clone()
    }
}

#[async_trait]
impl RatingStore for MemoryRatingStore {
    async fn find_by_ticker_and_time(
        &self,
        ticker: &str,
        time: DateTime<Utc>,
    ) -> Result<RatingEvent, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .rows
            .iter()
            .find(|r| r.ticker == ticker && r.time == time)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_ticker(&self, ticker: &str) -> Result<RatingEvent, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .rows
            .iter()
            .filter(|r| r.ticker == ticker)
            .max_by_key(|r| (r.time, r.id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, event: &RatingEvent) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner
            .rows
            .iter()
            .any(|r| r.ticker == event.ticker && r.time == event.time)
        {
            return Err(StoreError::Duplicate {
                ticker: event.ticker.clone(),
                time: event.time.to_rfc3339(),
            });
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let mut row = event.clone();
        row.id = Some(id);
        inner.rows.push(row);
        Ok(id)
    }

    async fn recent_window(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut rows = inner.rows.clone();
        rows.sort_by(|a, b| b.time.cmp(&a.time).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn top_by_target_price(&self, limit: usize) -> Result<Vec<RatingEvent>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut rows = inner.rows.clone();
        rows.sort_by(|a, b| b.target_to.cmp(&a.target_to).then(a.id.cmp(&b.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RatingEvent>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.rows.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.lock().expect("store mutex poisoned").rows.len())
    }
}

// src/analyze/rank.rs
//! Ranking: score a candidate pool and keep the best `n`.
//!
//! - Sorted by score, highest first.
//! - Ties keep input order (stable sort), so the same pool always ranks the same.
//! - Events that cannot be scored (zero `target_from`) get [`UNSCORABLE`] and
//!   sink to the bottom instead of failing the whole request.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::analyze::scoring::Scorer;
use crate::ingest::types::RatingEvent;

/// Score assigned to events the scorer rejects.
pub const UNSCORABLE: f64 = f64::NEG_INFINITY;

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    pub event: RatingEvent,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn is_scorable(&self) -> bool {
        self.score != UNSCORABLE
    }
}

/// Score every event in input order.
pub fn score_candidates(
    events: Vec<RatingEvent>,
    scorer: &Scorer,
    now: DateTime<Utc>,
) -> Vec<ScoredCandidate> {
    events
        .into_iter()
        .map(|event| {
            let score = match scorer.score(&event, now) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(ticker = %event.ticker, error = %e, "event cannot be scored");
                    counter!("recommend_unscorable_total").increment(1);
                    UNSCORABLE
                }
            };
            ScoredCandidate { event, score }
        })
        .collect()
}

/// Stable descending sort by score.
pub fn rank(mut candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

/// Best `n` of `events`; the whole pool when `n` exceeds it, empty for an empty pool.
pub fn top_n(
    events: Vec<RatingEvent>,
    n: usize,
    scorer: &Scorer,
    now: DateTime<Utc>,
) -> Vec<ScoredCandidate> {
    let mut ranked = rank(score_candidates(events, scorer, now));
    ranked.truncate(n);
    ranked
}

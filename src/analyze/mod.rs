// src/analyze/mod.rs
//! Recommendation engine: per-event scoring and top-N ranking.

pub mod rank;
pub mod scoring;

// Re-export convenient types.
pub use crate::analyze::rank::{rank, score_candidates, top_n, ScoredCandidate, UNSCORABLE};
pub use crate::analyze::scoring::{Scorer, ScoringFormula};

//! Composite recommendation score for one rating event.
//!
//! score = (price_impact + rating_impact) * brokerage_weight [* recency_decay]
//!
//! - `price_impact`  : % change target_from → target_to, rounded to 2 dp
//! - `rating_impact` : ordinal(rating_to) - ordinal(rating_from)
//! - `brokerage_weight` : see [`BrokerageWeights`]
//! - `recency_decay` : max(0.5, 1 - days_since_event / 30), only for
//!   [`ScoringFormula::RecencyWeighted`]
//!
//! The two formulas are not interchangeable; pick one at construction.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::brokerage_weights::BrokerageWeights;
use crate::error::ScoreError;
use crate::ingest::types::RatingEvent;

pub const RECENCY_HORIZON_DAYS: f64 = 30.0;
pub const RECENCY_FLOOR: f64 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringFormula {
    /// (price + rating) * brokerage
    #[default]
    Plain,
    /// (price + rating) * brokerage * recency_decay
    #[serde(alias = "recency")]
    RecencyWeighted,
}

impl std::str::FromStr for ScoringFormula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "simple" => Ok(ScoringFormula::Plain),
            "recency" | "recency_weighted" | "recencyweighted" => {
                Ok(ScoringFormula::RecencyWeighted)
            }
            other => Err(format!("unknown scoring formula '{other}'")),
        }
    }
}

/// Ordinal for a rating label; unknown labels are neutral.
pub fn rating_ordinal(label: &str) -> f64 {
    match label {
        "Sell" => -2.0,
        "Neutral" => 0.0,
        "Buy" => 2.0,
        _ => 0.0,
    }
}

pub fn rating_impact(event: &RatingEvent) -> f64 {
    rating_ordinal(&event.rating_to) - rating_ordinal(&event.rating_from)
}

/// Percent change of the price target, half-away-from-zero to 2 dp.
pub fn price_impact(event: &RatingEvent) -> Result<f64, ScoreError> {
    if event.target_from.is_zero() {
        return Err(ScoreError::ZeroBaseline {
            ticker: event.ticker.clone(),
        });
    }
    let overflow = || ScoreError::Overflow {
        ticker: event.ticker.clone(),
    };
    let pct = event
        .target_to
        .checked_sub(event.target_from)
        .and_then(|delta| delta.checked_div(event.target_from))
        .and_then(|change| change.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(overflow)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Ok(pct.to_f64().unwrap_or(0.0))
}

/// Decay multiplier in [0.5, 1.0]. Future-dated events count as fresh.
pub fn recency_decay(event_time: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - event_time).num_seconds().max(0) as f64 / 86_400.0;
    (1.0 - days / RECENCY_HORIZON_DAYS).max(RECENCY_FLOOR)
}

/// Stateless scorer configured once at startup.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    formula: ScoringFormula,
    weights: BrokerageWeights,
}

impl Scorer {
    pub fn new(formula: ScoringFormula, weights: BrokerageWeights) -> Self {
        Self { formula, weights }
    }

    pub fn formula(&self) -> ScoringFormula {
        self.formula
    }

    pub fn weights(&self) -> &BrokerageWeights {
        &self.weights
    }

    /// Score `event` as of `now`. `now` is only read by the recency formula.
    pub fn score(&self, event: &RatingEvent, now: DateTime<Utc>) -> Result<f64, ScoreError> {
        let base = (price_impact(event)? + rating_impact(event))
            * self.weights.weight_for(&event.brokerage);
        Ok(match self.formula {
            ScoringFormula::Plain => base,
            ScoringFormula::RecencyWeighted => base * recency_decay(event.time, now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn event(from: Decimal, to: Decimal, rf: &str, rt: &str, broker: &str) -> RatingEvent {
        RatingEvent {
            id: None,
            ticker: "TEST".into(),
            company: "Test Corp".into(),
            brokerage: broker.into(),
            action: "target raised by".into(),
            rating_from: rf.into(),
            rating_to: rt.into(),
            target_from: from,
            target_to: to,
            time: now(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn goldman_upgrade_scores_33() {
        let ev = event(
            dec!(100),
            dec!(120),
            "Neutral",
            "Buy",
            "The Goldman Sachs Group",
        );
        let s = Scorer::default().score(&ev, now()).unwrap();
        assert!(approx(s, 33.0), "got {s}");
    }

    #[test]
    fn price_impact_rounds_to_two_places() {
        let ev = event(dec!(3), dec!(4), "", "", "");
        assert!(approx(price_impact(&ev).unwrap(), 33.33));
        let ev = event(dec!(8), dec!(7.9996), "", "", "");
        assert!(approx(price_impact(&ev).unwrap(), -0.01));
        // 0.005% rounds away from zero
        let ev = event(dec!(100), dec!(100.005), "", "", "");
        assert!(approx(price_impact(&ev).unwrap(), 0.01));
    }

    #[test]
    fn zero_baseline_is_an_error() {
        let ev = event(dec!(0), dec!(10), "Neutral", "Buy", "JP Morgan");
        assert_eq!(
            Scorer::default().score(&ev, now()),
            Err(ScoreError::ZeroBaseline {
                ticker: "TEST".into()
            })
        );
    }

    #[test]
    fn huge_ratio_is_an_overflow_not_a_panic() {
        let ev = event(
            crate::ingest::parse::parse_price("1").unwrap(),
            crate::ingest::parse::parse_price("1,000,000,000,000,000,000,000,000,000").unwrap(),
            "Neutral",
            "Buy",
            "",
        );
        assert_eq!(
            price_impact(&ev),
            Err(ScoreError::Overflow {
                ticker: "TEST".into()
            })
        );
    }

    #[test]
    fn division_overflow_is_not_reported_as_zero_baseline() {
        let ev = event(dec!(0.0001), dec!(79000000000000000000000000), "", "", "");
        assert_eq!(
            Scorer::default().score(&ev, now()),
            Err(ScoreError::Overflow {
                ticker: "TEST".into()
            })
        );
    }

    #[test]
    fn rating_vocabulary_and_unknown_labels() {
        assert_eq!(rating_ordinal("Sell"), -2.0);
        assert_eq!(rating_ordinal("Neutral"), 0.0);
        assert_eq!(rating_ordinal("Buy"), 2.0);
        assert_eq!(rating_ordinal("Outperform"), 0.0);
        assert_eq!(rating_ordinal("buy"), 0.0);

        let down = event(dec!(100), dec!(100), "Buy", "Sell", "");
        assert_eq!(rating_impact(&down), -4.0);
        let unknown = event(dec!(100), dec!(100), "Hold", "Buy", "");
        assert_eq!(rating_impact(&unknown), 2.0);
    }

    #[test]
    fn score_can_be_negative() {
        let ev = event(dec!(100), dec!(90), "Buy", "Sell", "Morgan Stanley");
        let s = Scorer::default().score(&ev, now()).unwrap();
        assert!(approx(s, (-10.0 - 4.0) * 1.3), "got {s}");
    }

    #[test]
    fn recency_decay_is_linear_then_floored() {
        let t = now();
        assert!(approx(recency_decay(t, t), 1.0));
        assert!(approx(recency_decay(t - Duration::days(6), t), 0.8));
        assert!(approx(recency_decay(t - Duration::days(15), t), 0.5));
        assert!(approx(recency_decay(t - Duration::days(200), t), 0.5));
        assert!(approx(recency_decay(t + Duration::days(3), t), 1.0));
    }

    #[test]
    fn recency_formula_multiplies_decay() {
        let mut ev = event(
            dec!(100),
            dec!(120),
            "Neutral",
            "Buy",
            "The Goldman Sachs Group",
        );
        ev.time = now() - Duration::days(3);
        let scorer = Scorer::new(
            ScoringFormula::RecencyWeighted,
            BrokerageWeights::default_seed(),
        );
        let s = scorer.score(&ev, now()).unwrap();
        assert!(approx(s, 33.0 * 0.9), "got {s}");

        let plain = Scorer::default().score(&ev, now()).unwrap();
        assert!(approx(plain, 33.0));
    }

    #[test]
    fn formula_parses_from_config_strings() {
        assert_eq!("plain".parse::<ScoringFormula>(), Ok(ScoringFormula::Plain));
        assert_eq!(
            " Recency ".parse::<ScoringFormula>(),
            Ok(ScoringFormula::RecencyWeighted)
        );
        assert!("fancy".parse::<ScoringFormula>().is_err());
    }
}

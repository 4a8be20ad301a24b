// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod analyze;
pub mod api;
pub mod brokerage_weights;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod service;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::types::{RatingDto, RatingEvent};
pub use crate::service::RatingsService;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::analyze::Scorer;
use crate::brokerage_weights::BrokerageWeights;
use crate::config::AppConfig;
use crate::ingest::providers::http::HttpRatingFeed;
use crate::store::SqliteRatingStore;

/// Everything the binary needs, built from one `AppConfig`.
pub struct App {
    pub router: axum::Router,
    pub service: Arc<RatingsService>,
    pub store: Arc<SqliteRatingStore>,
}

/// Open storage, build the feed client and the scorer, and assemble the router.
/// Fails only on misconfiguration or when the database cannot be opened.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<App> {
    let weights = BrokerageWeights::load_default(cfg.brokerage_weights_path.as_deref())
        .context("loading brokerage weights")?;
    let scorer = Scorer::new(cfg.scoring_formula, weights);

    let store = Arc::new(
        SqliteRatingStore::open(&cfg.database_url)
            .await
            .context("opening rating store")?,
    );
    let feed = Arc::new(
        HttpRatingFeed::new(&cfg.api_url, &cfg.api_key, cfg.feed_timeout)
            .context("building feed client")?,
    );

    let service = Arc::new(
        RatingsService::new(store.clone(), feed, scorer)
            .with_retry(cfg.retry)
            .with_window(cfg.recommendation_window),
    );

    info!(
        formula = ?cfg.scoring_formula,
        window = cfg.recommendation_window,
        max_attempts = cfg.retry.max_attempts,
        "app assembled"
    );

    let router = api::router(api::AppState::new(
        service.clone(),
        cfg.recommendation_limit,
    ));
    Ok(App {
        router,
        service,
        store,
    })
}

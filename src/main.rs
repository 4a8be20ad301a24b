//! Analyst Ratings Recommender: binary entrypoint.
//! Loads config, opens storage, kicks off the feed sync and serves the Axum router.

use analyst_ratings_recommender::{
    build_app, config::AppConfig, ingest::scheduler::spawn_sync_scheduler, metrics::Metrics,
};
use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - RATINGS_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("RATINGS_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sync=info,feed=info,store=info,warn"));

    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    // Missing API_URL / API_KEY stops the process here.
    let cfg = AppConfig::from_env().context("reading configuration")?;

    let app = build_app(&cfg).await?;
    let metrics = Metrics::init(cfg.recommendation_window)?;

    spawn_sync_scheduler(app.service.clone(), cfg.sync_interval);

    let router = app.router.merge(metrics.router());
    Ok(router.into())
}

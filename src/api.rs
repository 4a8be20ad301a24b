use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::StoreError;
use crate::ingest::types::RatingEvent;
use crate::ingest::SyncReport;
use crate::service::RatingsService;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Clone)]
pub struct AppState {
    service: Arc<RatingsService>,
    default_limit: usize,
}

impl AppState {
    pub fn new(service: Arc<RatingsService>, default_limit: usize) -> Self {
        Self {
            service,
            default_limit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stocks", get(list_stocks).post(add_stock))
        .route("/stocks/recommendations", get(recommendations))
        .route("/stocks/top-targets", get(top_targets))
        .route("/stocks/{ticker}", get(stock_by_ticker))
        .route("/admin/sync", post(run_sync))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body is always `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// Storage failed; details stay in the log.
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "storage unavailable".to_string(),
            ),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("not found".into()),
            StoreError::Duplicate { ticker, time } => {
                ApiError::Conflict(format!("{ticker} at {time} already stored"))
            }
            other => {
                tracing::error!(error = %other, "storage failure");
                ApiError::Unavailable
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(serde::Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn list_stocks(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<RatingEvent>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = q.offset.unwrap_or(0);
    Ok(Json(state.service.list_paged(limit, offset).await?))
}

async fn add_stock(
    State(state): State<AppState>,
    body: Result<Json<RatingEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<RatingEvent>), ApiError> {
    let Json(event) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if event.ticker.trim().is_empty() {
        return Err(ApiError::BadRequest("ticker must not be empty".into()));
    }
    if event.target_from.is_sign_negative() || event.target_to.is_sign_negative() {
        return Err(ApiError::BadRequest("targets must not be negative".into()));
    }
    let stored = state.service.add_event(event).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn recommendations(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<RatingEvent>>, ApiError> {
    let n = q.limit.unwrap_or(state.default_limit).min(MAX_PAGE_SIZE);
    Ok(Json(state.service.top_recommendations(n).await?))
}

async fn top_targets(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<RatingEvent>>, ApiError> {
    let n = q.limit.unwrap_or(state.default_limit).min(MAX_PAGE_SIZE);
    Ok(Json(state.service.top_by_target_price(n).await?))
}

async fn stock_by_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<RatingEvent>, ApiError> {
    match state.service.get_by_ticker(&ticker).await {
        Ok(ev) => Ok(Json(ev)),
        Err(StoreError::NotFound) => Err(ApiError::NotFound(format!("no rating for {ticker}"))),
        Err(e) => Err(e.into()),
    }
}

async fn run_sync(State(state): State<AppState>) -> Json<SyncReport> {
    Json(state.service.run_full_sync().await)
}

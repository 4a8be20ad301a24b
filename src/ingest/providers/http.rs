use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};

use crate::error::FetchError;
use crate::ingest::types::{FeedPage, RatingFeed};

const USER_AGENT: &str = concat!("analyst-ratings-recommender/", env!("CARGO_PKG_VERSION"));

/// Bearer-authenticated JSON feed: `GET {base_url}` for the first page,
/// `GET {base_url}?next_page={cursor}` for the rest.
pub struct HttpRatingFeed {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRatingFeed {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, cursor: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(&self.base_url)
            .bearer_auth(&self.api_key)
            .header(header::CONTENT_TYPE, "application/json");
        if !cursor.is_empty() {
            req = req.query(&[("next_page", cursor)]);
        }
        req
    }
}

#[async_trait]
impl RatingFeed for HttpRatingFeed {
    async fn fetch_page(&self, cursor: &str) -> Result<FeedPage, FetchError> {
        let resp = match self.request(cursor).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(target: "feed", error = ?e, cursor, "feed http error");
                return Err(e.into());
            }
        };

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.bytes().await?;
        let page: FeedPage =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        tracing::debug!(
            target: "feed",
            cursor,
            items = page.items.len(),
            next = %page.next_page,
            "page fetched"
        );
        Ok(page)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

// src/ingest/providers/scripted.rs
//! In-process feed that replays a fixed script of pages and failures.
//! Used by the test-suite and for offline demos.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::ingest::types::{FeedPage, RatingFeed};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    Page(FeedPage),
    Fail(String),
}

/// Replays `steps` in order, one per `fetch_page` call. Once the script runs
/// out every call fails.
pub struct ScriptedFeed {
    steps: Mutex<VecDeque<Step>>,
    cursors: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            cursors: Mutex::new(Vec::new()),
        }
    }

    /// A feed that serves `pages` in order, chaining them with cursors
    /// `p2`, `p3`, ... and ending with an empty cursor.
    pub fn from_pages(pages: Vec<Vec<crate::ingest::types::RatingDto>>) -> Self {
        let n = pages.len();
        let steps = pages
            .into_iter()
            .enumerate()
            .map(|(i, items)| {
                let next_page = if i + 1 < n {
                    format!("p{}", i + 2)
                } else {
                    String::new()
                };
                Step::Page(FeedPage { items, next_page })
            })
            .collect();
        Self::new(steps)
    }

    /// Cursors requested so far, in call order.
    pub fn requested_cursors(&self) -> Vec<String> {
        self.cursors.lock().expect("scripted feed mutex poisoned").clone()
    }

    pub fn calls(&self) -> usize {
        self.cursors.lock().expect("scripted feed mutex poisoned").len()
    }
}

#[async_trait]
impl RatingFeed for ScriptedFeed {
    async fn fetch_page(&self, cursor: &str) -> Result<FeedPage, FetchError> {
        self.cursors
            .lock()
            .expect("scripted feed mutex poisoned")
            .push(cursor.to_string());
        let step = self
            .steps
            .lock()
            .expect("scripted feed mutex poisoned")
            .pop_front();
        match step {
            Some(Step::Page(page)) => Ok(page),
            Some(Step::Fail(msg)) => Err(FetchError::Unavailable(msg)),
            None => Err(FetchError::Unavailable("script exhausted".into())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// src/feed/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A candidate news item. `link` is the identity used for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
    pub link: String,
}

impl NewsItem {
    /// Title and body joined the way they are handed to the language model.
    pub fn prompt_text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.body)
        }
    }
}

#[async_trait]
pub trait SourceFeed: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &'static str;
}

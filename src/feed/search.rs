// src/feed/search.rs
//! Google Custom Search JSON API as a news source.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::config::SearchCredentials;
use crate::error::{BotError, Result};
use crate::feed::normalize_text;
use crate::feed::types::{NewsItem, SourceFeed};

pub const DEFAULT_SEARCH_BASE: &str = "https://www.googleapis.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

pub struct SearchFeed {
    client: reqwest::Client,
    creds: SearchCredentials,
    query: String,
    num: usize,
    base_url: String,
}

impl SearchFeed {
    pub fn new(client: reqwest::Client, creds: SearchCredentials, query: impl Into<String>) -> Self {
        Self {
            client,
            creds,
            query: query.into(),
            num: 5,
            base_url: DEFAULT_SEARCH_BASE.to_string(),
        }
    }

    pub fn with_num(mut self, num: usize) -> Self {
        self.num = num.clamp(1, 10);
        self
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SourceFeed for SearchFeed {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        tracing::info!(query = %self.query, "searching news");
        let url = format!("{}/customsearch/v1", self.base_url);
        let num = self.num.to_string();
        let resp = self
            .client
            .get(url)
            .query(&[
                ("key", self.creds.api_key.as_str()),
                ("cx", self.creds.cx_id.as_str()),
                ("q", self.query.as_str()),
                ("num", num.as_str()),
                ("dateRestrict", "d1"),
                ("lr", "lang_en"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BotError::network("search get", e.without_url()))?;
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| BotError::malformed(format!("search json: {e}")))?;

        let now = Utc::now();
        Ok(body
            .items
            .into_iter()
            .filter(|it| !it.link.trim().is_empty())
            .map(|it| NewsItem {
                title: normalize_text(&it.title),
                body: normalize_text(&it.snippet),
                published_at: now,
                link: it.link.trim().to_string(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "search"
    }
}

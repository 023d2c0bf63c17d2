// src/feed/mod.rs
pub mod rss;
pub mod search;
pub mod simulated;
pub mod types;

use std::time::Duration;

use metrics::counter;
use once_cell::sync::OnceCell;

use crate::config::{FeedConfig, FeedKind, SearchCredentials};
use crate::feed::rss::RssFeed;
use crate::feed::search::SearchFeed;
use crate::feed::simulated::SimulatedFeed;
use crate::feed::types::{NewsItem, SourceFeed};

const MAX_TEXT_CHARS: usize = 3000;

/// Normalize feed text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Fetch from `source` and keep at most `limit` items in feed order.
/// Failures are logged and yield an empty list; nothing is retried.
pub async fn fetch_capped(source: &dyn SourceFeed, limit: usize) -> Vec<NewsItem> {
    crate::metrics::ensure_described();
    match source.fetch_latest().await {
        Ok(mut items) => {
            items.truncate(limit);
            counter!("feed_items_total").increment(items.len() as u64);
            tracing::info!(source = source.name(), count = items.len(), "feed fetched");
            items
        }
        Err(e) => {
            tracing::warn!(error = %e, source = source.name(), "feed error");
            counter!("feed_errors_total").increment(1);
            Vec::new()
        }
    }
}

/// Build the configured source. Search without credentials degrades to simulated results.
pub fn build_source(
    cfg: &FeedConfig,
    search: Option<SearchCredentials>,
) -> anyhow::Result<Box<dyn SourceFeed>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("ai-news-bot/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()?;

    Ok(match cfg.kind {
        FeedKind::Rss => Box::new(RssFeed::from_url(cfg.rss_url.clone(), client)),
        FeedKind::Search => match search {
            Some(creds) => Box::new(
                SearchFeed::new(client, creds, cfg.query.clone()).with_num(cfg.effective_limit()),
            ),
            None => {
                tracing::warn!("search credentials missing; using simulated results");
                Box::new(SimulatedFeed)
            }
        },
        FeedKind::Simulated => Box::new(SimulatedFeed),
    })
}

// src/feed/rss.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::error::{BotError, Result};
use crate::feed::normalize_text;
use crate::feed::types::{NewsItem, SourceFeed};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0)
}

pub struct RssFeed {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeed {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    fn parse_items_from_str(s: &str) -> Result<Vec<NewsItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .map_err(|e| BotError::malformed(format!("parsing rss xml: {e}")))?;

        let fetched_at = Utc::now();
        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let Some(link) = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())
            else {
                continue;
            };
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            let body = normalize_text(it.description.as_deref().unwrap_or_default());
            if title.is_empty() && body.is_empty() {
                continue;
            }
            out.push(NewsItem {
                title,
                body,
                published_at: it
                    .pub_date
                    .as_deref()
                    .and_then(parse_rfc2822)
                    .unwrap_or(fetched_at),
                link,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl SourceFeed for RssFeed {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| BotError::network("rss get", e))?;
                let body = resp
                    .text()
                    .await
                    .map_err(|e| BotError::network("rss body", e))?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc2822_dates_become_utc() {
        let dt = parse_rfc2822("Tue, 05 Aug 2025 14:30:00 +0200").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 8, 5, 12, 30, 0).unwrap());
        assert!(parse_rfc2822("yesterday").is_none());
    }

    #[test]
    fn items_without_link_are_skipped() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>
            <item><title>No link</title><description>x</description></item>
            <item><title>With link</title><link> https://a.example/1 </link>
                  <description>&lt;p&gt;Body&nbsp;text&lt;/p&gt;</description></item>
        </channel></rss>"#;
        let items = RssFeed::parse_items_from_str(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://a.example/1");
        assert_eq!(items[0].body, "Body text");
    }

    #[test]
    fn empty_channel_is_ok() {
        let xml = r#"<rss><channel><title>empty</title></channel></rss>"#;
        assert!(RssFeed::parse_items_from_str(xml).unwrap().is_empty());
    }
}

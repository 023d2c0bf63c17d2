// src/feed/simulated.rs
//! Offline stand-in for the search API, used when no search credentials are configured.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::error::Result;
use crate::feed::types::{NewsItem, SourceFeed};

const SAMPLES: &[(&str, &str, &str, (i32, u32, u32))] = &[
    (
        "AI in the workplace: what employees need to excel with intelligent agents",
        "A new report from Microsoft details the future of AI in business, emphasizing the need for skilled employees to work alongside intelligent agents and Copilot.",
        "https://www.example-news.com/microsoft-ai-agent",
        (2025, 8, 2),
    ),
    (
        "OpenAI's latest breakthrough: a reasoning agent that learns from its mistakes",
        "OpenAI's new agent can now self-correct its actions, a significant step forward in autonomous AI and self-improving systems.",
        "https://www.another-news-site.com/openai-web-agent",
        (2025, 8, 1),
    ),
    (
        "DeepMind researcher on the future of multi-modal AI",
        "A key researcher from DeepMind shares insights into the development of multi-modal AI and its potential impact on various industries.",
        "https://www.ai-finance-news.com/deep-mind-research",
        (2025, 7, 31),
    ),
    (
        "Google's new agent-based model for climate science",
        "Google Research introduces a novel AI agent that simulates climate change scenarios to predict future ecological trends.",
        "https://www.google-research.com/ai-agents-paper",
        (2025, 7, 30),
    ),
    (
        "The new AI arms race: tech giants compete for top talent with massive salaries",
        "Tech companies like Meta and Google are offering unprecedented salaries and benefits to attract the best AI talent, with offers reaching into the millions.",
        "https://www.example-news.com/ai-talent-arms-race",
        (2025, 7, 29),
    ),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedFeed;

impl SimulatedFeed {
    pub fn items() -> Vec<NewsItem> {
        SAMPLES
            .iter()
            .map(|(title, body, link, (y, m, d))| NewsItem {
                title: title.to_string(),
                body: body.to_string(),
                published_at: Utc
                    .with_ymd_and_hms(*y, *m, *d, 0, 0, 0)
                    .single()
                    .unwrap_or_default(),
                link: link.to_string(),
            })
            .collect()
    }
}

#[async_trait]
impl SourceFeed for SimulatedFeed {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        Ok(Self::items())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

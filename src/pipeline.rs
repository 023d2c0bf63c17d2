// src/pipeline.rs
//! One publishing run: fetch → filter → select → summarize → illustrate → publish → record.
//!
//! Collaborators are injected; nothing here builds a client on its own. A link is recorded
//! only after the publisher confirmed delivery, so an aborted run leaves the ledger untouched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use rand::Rng;
use serde::Serialize;

use crate::error::{BotError, Result};
use crate::feed::fetch_capped;
use crate::feed::types::{NewsItem, SourceFeed};
use crate::illustrate::Illustrator;
use crate::ledger::PublicationLedger;
use crate::publish::{render_message, Publisher};
use crate::summarize::Summarizer;

/// How the item to publish is chosen among the unpublished candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Feed order.
    First,
    /// Uniformly random.
    Random,
    /// 1-based position in the candidate list shown to the user.
    Index(usize),
}

impl SelectionPolicy {
    pub fn select<'a>(&self, items: &'a [NewsItem]) -> Result<&'a NewsItem> {
        let out_of_range = |index| BotError::Selection {
            index,
            available: items.len(),
        };
        match *self {
            SelectionPolicy::First => items.first().ok_or_else(|| out_of_range(1)),
            SelectionPolicy::Random => {
                if items.is_empty() {
                    return Err(out_of_range(1));
                }
                Ok(&items[rand::rng().random_range(0..items.len())])
            }
            SelectionPolicy::Index(n) => n
                .checked_sub(1)
                .and_then(|i| items.get(i))
                .ok_or_else(|| out_of_range(n)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Filter,
    Select,
    Summarize,
    Illustrate,
    Publish,
    Record,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Filter => "filter",
            Stage::Select => "select",
            Stage::Summarize => "summarize",
            Stage::Illustrate => "illustrate",
            Stage::Publish => "publish",
            Stage::Record => "record",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Published { link: String, title: String },
    NoOp,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(Completion),
    Aborted { stage: Stage, error: BotError },
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed(Completion::Published { .. }) => "published",
            RunOutcome::Completed(Completion::NoOp) => "noop",
            RunOutcome::Aborted { .. } => "aborted",
        }
    }

    pub fn published_link(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed(Completion::Published { link, .. }) => Some(link),
            _ => None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.published_link().is_some()
    }
}

fn observe(stage: Stage, t0: Instant) {
    let ms = t0.elapsed().as_secs_f64() * 1000.0;
    histogram!("pipeline_stage_ms", "stage" => stage.as_str()).record(ms);
    tracing::debug!(stage = stage.as_str(), ms = ms as u64, "stage done");
}

pub struct PublishPipeline {
    source: Arc<dyn SourceFeed>,
    limit: usize,
    ledger: PublicationLedger,
    retention_days: Option<i64>,
    summarizer: Summarizer,
    illustrator: Option<Arc<dyn Illustrator>>,
    publisher: Arc<dyn Publisher>,
}

impl PublishPipeline {
    pub fn new(
        source: Arc<dyn SourceFeed>,
        ledger: PublicationLedger,
        summarizer: Summarizer,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            source,
            limit: 3,
            ledger,
            retention_days: None,
            summarizer,
            illustrator: None,
            publisher,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_retention(mut self, days: Option<i64>) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_illustrator(mut self, illustrator: Arc<dyn Illustrator>) -> Self {
        self.illustrator = Some(illustrator);
        self
    }

    pub fn ledger(&self) -> &PublicationLedger {
        &self.ledger
    }

    /// Fetch and drop everything already published. Feed order is kept.
    pub async fn candidates(&mut self) -> Vec<NewsItem> {
        let t0 = Instant::now();
        self.ledger.reload(self.retention_days);
        let items = fetch_capped(self.source.as_ref(), self.limit).await;
        observe(Stage::Fetch, t0);

        let t0 = Instant::now();
        let total = items.len();
        let mut seen = HashSet::new();
        let fresh: Vec<NewsItem> = items
            .into_iter()
            .filter(|i| !self.ledger.contains(&i.link) && seen.insert(i.link.clone()))
            .collect();
        observe(Stage::Filter, t0);
        tracing::info!(total, fresh = fresh.len(), "candidates filtered");
        fresh
    }

    /// Full automatic run.
    pub async fn run(&mut self, policy: SelectionPolicy) -> RunOutcome {
        crate::metrics::ensure_described();
        counter!("pipeline_runs_total").increment(1);
        let candidates = self.candidates().await;
        self.run_with(&candidates, policy).await
    }

    /// Select from an already fetched list and publish the choice.
    pub async fn run_with(
        &mut self,
        candidates: &[NewsItem],
        policy: SelectionPolicy,
    ) -> RunOutcome {
        let pending: Vec<NewsItem> = candidates
            .iter()
            .filter(|i| !self.ledger.contains(&i.link))
            .cloned()
            .collect();
        if pending.is_empty() {
            counter!("pipeline_noop_total").increment(1);
            tracing::info!("nothing new to publish");
            return RunOutcome::Completed(Completion::NoOp);
        }

        // An index refers to the list as it was shown, published entries included.
        let pool = match policy {
            SelectionPolicy::Index(_) => candidates,
            SelectionPolicy::First | SelectionPolicy::Random => pending.as_slice(),
        };
        let t0 = Instant::now();
        let item = match policy.select(pool) {
            Ok(item) => item.clone(),
            Err(error) => return aborted(Stage::Select, error),
        };
        observe(Stage::Select, t0);
        self.publish_item(&item).await
    }

    /// Summarize, illustrate, publish and record a single item.
    pub async fn publish_item(&mut self, item: &NewsItem) -> RunOutcome {
        if self.ledger.contains(&item.link) {
            counter!("pipeline_noop_total").increment(1);
            tracing::info!(link = %item.link, "already published; skipping");
            return RunOutcome::Completed(Completion::NoOp);
        }
        tracing::info!(title = %item.title, link = %item.link, "processing item");

        let t0 = Instant::now();
        let summary = match self.summarizer.summarize(item).await {
            Ok(s) => s,
            Err(error) => return aborted(Stage::Summarize, error),
        };
        observe(Stage::Summarize, t0);

        let image = match &self.illustrator {
            Some(illustrator) => {
                let t0 = Instant::now();
                let png = illustrator.illustrate(&item.prompt_text()).await;
                observe(Stage::Illustrate, t0);
                png
            }
            None => None,
        };

        let t0 = Instant::now();
        let now = Utc::now();
        let message = render_message(&summary, &item.link, now, image);
        if let Err(error) = self.publisher.publish(&message).await {
            return aborted(Stage::Publish, error);
        }
        observe(Stage::Publish, t0);

        let t0 = Instant::now();
        // A failed write is already logged and counted; the in-memory entry still blocks repeats.
        let _ = self.ledger.record(&item.link, Some(&summary.title), now);
        observe(Stage::Record, t0);

        counter!("pipeline_published_total").increment(1);
        tracing::info!(link = %item.link, publisher = self.publisher.name(), "published");
        RunOutcome::Completed(Completion::Published {
            link: item.link.clone(),
            title: summary.title,
        })
    }
}

fn aborted(stage: Stage, error: BotError) -> RunOutcome {
    counter!("pipeline_aborted_total", "stage" => stage.as_str()).increment(1);
    tracing::warn!(stage = stage.as_str(), kind = error.kind(), error = %error, "run aborted");
    RunOutcome::Aborted { stage, error }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<NewsItem> {
        (1..=n)
            .map(|i| NewsItem {
                title: format!("t{i}"),
                body: String::new(),
                published_at: Utc::now(),
                link: format!("https://n.example/{i}"),
            })
            .collect()
    }

    #[test]
    fn index_is_one_based_and_bounded() {
        let v = items(3);
        assert_eq!(SelectionPolicy::Index(2).select(&v).unwrap().title, "t2");
        for bad in [0, 4] {
            let err = SelectionPolicy::Index(bad).select(&v).unwrap_err();
            assert!(matches!(err, BotError::Selection { available: 3, .. }));
        }
    }

    #[test]
    fn first_and_random_pick_from_list() {
        let v = items(3);
        assert_eq!(SelectionPolicy::First.select(&v).unwrap().title, "t1");
        let r = SelectionPolicy::Random.select(&v).unwrap();
        assert!(v.contains(r));
        assert!(SelectionPolicy::Random.select(&[]).is_err());
    }

    #[test]
    fn outcome_labels() {
        let done = RunOutcome::Completed(Completion::Published {
            link: "l".into(),
            title: "t".into(),
        });
        assert_eq!(done.label(), "published");
        assert_eq!(done.published_link(), Some("l"));
        let ab = RunOutcome::Aborted {
            stage: Stage::Publish,
            error: BotError::network("telegram", "down"),
        };
        assert_eq!(ab.label(), "aborted");
        assert!(!ab.is_published());
    }
}

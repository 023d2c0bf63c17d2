// tests/metrics.rs
//
// One process-wide recorder per test binary, so everything lives in a single test.

use std::sync::Arc;

use ai_news_bot::api::{create_router, AppState};
use ai_news_bot::feed::simulated::SimulatedFeed;
use ai_news_bot::inference::MockInference;
use ai_news_bot::ledger::PublicationLedger;
use ai_news_bot::metrics::Metrics;
use ai_news_bot::publish::{OutgoingMessage, Publisher};
use ai_news_bot::summarize::Summarizer;
use ai_news_bot::{PublishPipeline, Result, SelectionPolicy};
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

struct Sink;

#[async_trait]
impl Publisher for Sink {
    async fn publish(&self, _message: &OutgoingMessage) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "sink"
    }
}

#[tokio::test]
async fn metrics_endpoint_contains_pipeline_series() {
    let metrics = Metrics::init().expect("install recorder");
    let pipeline = PublishPipeline::new(
        Arc::new(SimulatedFeed),
        PublicationLedger::in_memory(),
        Summarizer::new(Arc::new(MockInference::default())),
        Arc::new(Sink),
    );
    let app = create_router(AppState::new(pipeline, SelectionPolicy::First), &metrics);

    let run = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(run.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "pipeline_runs_total",
        "pipeline_published_total",
        "feed_items_total",
        "pipeline_stage_ms",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
}

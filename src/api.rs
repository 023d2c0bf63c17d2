// src/api.rs
//! HTTP trigger: `GET /` performs one pipeline run.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::metrics::Metrics;
use crate::pipeline::{PublishPipeline, RunOutcome, SelectionPolicy, Stage};

#[derive(Clone)]
pub struct AppState {
    /// Runs are serialized; a second trigger waits for the first to finish.
    pipeline: Arc<Mutex<PublishPipeline>>,
    policy: SelectionPolicy,
}

impl AppState {
    pub fn new(pipeline: PublishPipeline, policy: SelectionPolicy) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            policy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: &'static str,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&RunOutcome> for RunResponse {
    fn from(outcome: &RunOutcome) -> Self {
        let (status, stage, error) = match outcome {
            RunOutcome::Aborted { stage, error } => {
                ("error", Some(*stage), Some(error.to_string()))
            }
            RunOutcome::Completed(_) => ("ok", None, None),
        };
        Self {
            status,
            outcome: outcome.label(),
            link: outcome.published_link().map(str::to_string),
            stage,
            error,
        }
    }
}

pub fn create_router(state: AppState, metrics: &Metrics) -> Router {
    Router::new()
        .route("/", get(trigger_run))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .merge(metrics.router())
}

async fn trigger_run(State(state): State<AppState>) -> (StatusCode, Json<RunResponse>) {
    let mut pipeline = state.pipeline.lock().await;
    let outcome = pipeline.run(state.policy).await;
    let code = match outcome {
        RunOutcome::Completed(_) => StatusCode::OK,
        RunOutcome::Aborted { .. } => StatusCode::BAD_GATEWAY,
    };
    (code, Json(RunResponse::from(&outcome)))
}

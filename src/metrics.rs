// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs started.");
        describe_counter!("pipeline_published_total", "Items confirmed sent.");
        describe_counter!("pipeline_noop_total", "Runs with nothing new to publish.");
        describe_counter!("pipeline_aborted_total", "Runs aborted by summarize or publish errors.");
        describe_counter!("feed_items_total", "Candidate items returned by sources.");
        describe_counter!("feed_errors_total", "Source fetch/parse errors.");
        describe_counter!("ledger_persist_errors_total", "Failed ledger writes.");
        describe_counter!(
            "illustrator_fallback_total",
            "Placeholder images used after generation failures."
        );
        describe_counter!(
            "inference_gate_queued_total",
            "Inference callers that had to wait for the gate."
        );
        describe_histogram!("pipeline_stage_ms", "Per-stage pipeline time in milliseconds.");
        describe_histogram!("feed_parse_ms", "RSS parse time in milliseconds.");
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_described();
        Ok(Self { handle })
    }

    /// A handle that is not wired as the global recorder; renders empty output.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

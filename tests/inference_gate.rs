// tests/inference_gate.rs
//
// At most one request reaches the model at a time; late callers get a queued notice.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ai_news_bot::inference::gate::{GatedClient, InferenceGate};
use ai_news_bot::inference::InferenceClient;
use ai_news_bot::{BotError, Result};
use async_trait::async_trait;

/// Tracks how many calls are inside `complete` at once.
#[derive(Default)]
struct SlowModel {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl InferenceClient for SlowModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("echo {prompt}"))
    }

    fn provider_name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_are_serialized_and_notified() {
    let model = Arc::new(SlowModel::default());
    let gate = InferenceGate::new(Duration::from_secs(10));
    let client = Arc::new(GatedClient::new(model.clone(), gate));
    let notices = Arc::new(AtomicUsize::new(0));

    // Hold the slot so every task below has to queue.
    let held = client.gate().try_acquire().expect("gate starts free");

    let mut tasks = Vec::new();
    for i in 0..6 {
        let client = client.clone();
        let notices = notices.clone();
        tasks.push(tokio::spawn(async move {
            client
                .complete_with_notice(&format!("p{i}"), move || {
                    notices.fetch_add(1, Ordering::SeqCst);
                })
                .await
        }));
    }

    // Let every task reach the gate before releasing it.
    while notices.load(Ordering::SeqCst) < 6 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    drop(held);

    for t in tasks {
        let reply = t.await.unwrap().unwrap();
        assert!(reply.starts_with("echo p"));
    }
    assert_eq!(notices.load(Ordering::SeqCst), 6);
    assert_eq!(model.calls.load(Ordering::SeqCst), 6);
    assert_eq!(model.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn uncontended_call_gets_no_notice() {
    let client = GatedClient::new(
        Arc::new(SlowModel::default()),
        InferenceGate::new(Duration::from_secs(1)),
    );
    let notified = Arc::new(AtomicUsize::new(0));
    let n = notified.clone();
    client
        .complete_with_notice("solo", move || {
            n.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert!(!client.gate().is_busy());
}

#[tokio::test]
async fn waiting_past_the_timeout_fails() {
    let gate = InferenceGate::new(Duration::from_millis(30));
    let client = GatedClient::new(Arc::new(SlowModel::default()), gate.clone());
    let _held = gate.try_acquire().unwrap();

    let err = client.complete("late").await.unwrap_err();
    assert!(matches!(err, BotError::GateTimeout(d) if d == Duration::from_millis(30)));
}

// src/inference/gate.rs
//! Single-slot gate in front of the local inference service.
//! One request in flight at a time; late callers are told they are queued, then wait
//! up to a timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{BotError, Result};
use crate::inference::InferenceClient;

#[derive(Debug, Clone)]
pub struct InferenceGate {
    sem: Arc<Semaphore>,
    timeout: Duration,
}

/// Held while a request is in flight; dropping it opens the gate.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl InferenceGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(1)),
            timeout,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.sem.available_permits() == 0
    }

    pub fn try_acquire(&self) -> Option<GatePermit> {
        self.sem
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|p| GatePermit { _permit: p })
    }

    /// Wait for the slot, bounded by the gate timeout.
    pub async fn acquire_queued(&self) -> Result<GatePermit> {
        match tokio::time::timeout(self.timeout, self.sem.clone().acquire_owned()).await {
            Ok(Ok(p)) => Ok(GatePermit { _permit: p }),
            // The semaphore is never closed; treat it like a timeout if it ever is.
            Ok(Err(_)) | Err(_) => Err(BotError::GateTimeout(self.timeout)),
        }
    }

    /// Take the slot immediately if free; otherwise call `on_queued` once and wait.
    pub async fn acquire(&self, on_queued: impl FnOnce() + Send) -> Result<GatePermit> {
        if let Some(p) = self.try_acquire() {
            return Ok(p);
        }
        counter!("inference_gate_queued_total").increment(1);
        on_queued();
        self.acquire_queued().await
    }
}

/// Wraps a client so every call passes through the gate.
pub struct GatedClient<C> {
    inner: C,
    gate: InferenceGate,
}

impl<C: InferenceClient> GatedClient<C> {
    pub fn new(inner: C, gate: InferenceGate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &InferenceGate {
        &self.gate
    }

    /// Like `complete`, with a caller-supplied queued notice.
    pub async fn complete_with_notice(
        &self,
        prompt: &str,
        on_queued: impl FnOnce() + Send,
    ) -> Result<String> {
        let _permit = self.gate.acquire(on_queued).await?;
        self.inner.complete(prompt).await
    }
}

#[async_trait]
impl<C: InferenceClient> InferenceClient for GatedClient<C> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_with_notice(prompt, || {
            tracing::info!("inference busy; request queued");
        })
        .await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

// src/inference/mod.rs
//! Client for the locally hosted language model.
//!
//! One interface (`InferenceClient::complete`) over three wire dialects:
//! - `completions`: `POST /v1/completions`, reply `choices[0].text`
//! - `chat`: `POST /v1/chat/completions`, reply `choices[0].message.content`
//! - `ollama`: `POST /api/chat`, reply `message.content`
//!
//! The two OpenAI-style dialects can also stream (SSE, see [`stream`]).

pub mod gate;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

use crate::config::{Dialect, InferenceConfig};
use crate::error::{BotError, Result};
use crate::inference::stream::SseAccumulator;

pub const ENV_TEST_MODE: &str = "INFERENCE_TEST_MODE";

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send `prompt` and return the model's text reply (trimmed, never empty).
    async fn complete(&self, prompt: &str) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynInference = Arc<dyn InferenceClient>;

#[async_trait]
impl<T: InferenceClient + ?Sized> InferenceClient for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt).await
    }
    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}

/// HTTP client for the local inference service.
pub struct HttpInference {
    http: reqwest::Client,
    cfg: InferenceConfig,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Req<'a> {
    Completions {
        model: &'a str,
        prompt: &'a str,
        temperature: f32,
        max_tokens: u32,
        stream: bool,
    },
    Chat {
        model: &'a str,
        messages: Vec<Msg<'a>>,
        temperature: f32,
        max_tokens: u32,
        stream: bool,
    },
    Ollama {
        model: &'a str,
        messages: Vec<Msg<'a>>,
        stream: bool,
        options: OllamaOptions,
    },
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

impl HttpInference {
    pub fn new(cfg: InferenceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ai-news-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| BotError::Config(format!("http client: {e}")))?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        let path = match self.cfg.dialect {
            Dialect::Completions => "/v1/completions",
            Dialect::Chat => "/v1/chat/completions",
            Dialect::Ollama => "/api/chat",
        };
        format!("{}{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    /// Ollama streams NDJSON, not SSE; we only stream the OpenAI-style dialects.
    fn streaming(&self) -> bool {
        self.cfg.stream && self.cfg.dialect != Dialect::Ollama
    }

    fn request<'a>(&'a self, prompt: &'a str) -> Req<'a> {
        let cfg = &self.cfg;
        let messages = || {
            vec![Msg {
                role: "user",
                content: prompt,
            }]
        };
        match cfg.dialect {
            Dialect::Completions => Req::Completions {
                model: &cfg.model,
                prompt,
                temperature: cfg.temperature,
                max_tokens: cfg.max_tokens,
                stream: self.streaming(),
            },
            Dialect::Chat => Req::Chat {
                model: &cfg.model,
                messages: messages(),
                temperature: cfg.temperature,
                max_tokens: cfg.max_tokens,
                stream: self.streaming(),
            },
            Dialect::Ollama => Req::Ollama {
                model: &cfg.model,
                messages: messages(),
                stream: false,
                options: OllamaOptions {
                    temperature: cfg.temperature,
                    num_predict: cfg.max_tokens,
                },
            },
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInference {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let t0 = std::time::Instant::now();
        let resp = self
            .http
            .post(self.endpoint())
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| BotError::network("inference", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BotError::network(
                "inference",
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let text = if self.streaming() {
            let mut acc = SseAccumulator::new();
            let mut body = resp.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| BotError::network("inference stream", e))?;
                acc.push(&chunk)?;
                if acc.is_done() {
                    break;
                }
            }
            acc.finish()?
        } else {
            let v: Value = resp
                .json()
                .await
                .map_err(|e| BotError::malformed(format!("inference body is not json: {e}")))?;
            extract_text(self.cfg.dialect, &v)?.to_string()
        };

        let cleaned = text.trim().to_string();
        if cleaned.is_empty() {
            return Err(BotError::malformed("empty completion"));
        }
        tracing::debug!(
            dialect = ?self.cfg.dialect,
            ms = t0.elapsed().as_millis() as u64,
            chars = cleaned.len(),
            "inference reply"
        );
        Ok(cleaned)
    }

    fn provider_name(&self) -> &'static str {
        match self.cfg.dialect {
            Dialect::Completions => "completions",
            Dialect::Chat => "chat",
            Dialect::Ollama => "ollama",
        }
    }
}

/// Pull the reply text out of a non-streamed response body.
pub fn extract_text(dialect: Dialect, v: &Value) -> Result<&str> {
    match dialect {
        Dialect::Ollama => v
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| BotError::malformed("missing message.content")),
        Dialect::Completions | Dialect::Chat => {
            let choices = v
                .get("choices")
                .and_then(Value::as_array)
                .ok_or_else(|| BotError::malformed("missing choices"))?;
            let first = choices
                .first()
                .ok_or_else(|| BotError::malformed("empty choices"))?;
            first
                .get("text")
                .and_then(Value::as_str)
                .or_else(|| first.get("message")?.get("content")?.as_str())
                .ok_or_else(|| BotError::malformed("choices[0] has no text"))
        }
    }
}

/// Deterministic offline client: always returns the same reply.
#[derive(Debug, Clone)]
pub struct MockInference {
    pub fixed: String,
}

impl Default for MockInference {
    fn default() -> Self {
        Self {
            fixed: "TÍTULO: Mock headline\nRESUMEN: Mock summary.\nCOMENTARIO: Mock commentary."
                .to_string(),
        }
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.fixed.clone())
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory: `INFERENCE_TEST_MODE=mock` gives the mock client, otherwise HTTP.
pub fn build_client(cfg: &InferenceConfig) -> Result<DynInference> {
    if std::env::var(ENV_TEST_MODE)
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockInference::default()));
    }
    Ok(Arc::new(HttpInference::new(cfg.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_each_dialect() {
        let c = json!({"choices": [{"text": "hi"}]});
        let ch = json!({"choices": [{"message": {"role": "assistant", "content": "yo"}}]});
        let o = json!({"message": {"role": "assistant", "content": "hey"}, "done": true});
        assert_eq!(extract_text(Dialect::Completions, &c).unwrap(), "hi");
        assert_eq!(extract_text(Dialect::Chat, &ch).unwrap(), "yo");
        assert_eq!(extract_text(Dialect::Completions, &ch).unwrap(), "yo");
        assert_eq!(extract_text(Dialect::Ollama, &o).unwrap(), "hey");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = extract_text(Dialect::Completions, &json!({"error": "oops"})).unwrap_err();
        assert!(matches!(err, BotError::MalformedResponse(ref m) if m.contains("choices")));
        let err = extract_text(Dialect::Chat, &json!({"choices": []})).unwrap_err();
        assert!(matches!(err, BotError::MalformedResponse(_)));
    }

    #[serial_test::serial]
    #[test]
    fn test_mode_env_selects_mock() {
        std::env::set_var(ENV_TEST_MODE, "mock");
        let client = build_client(&InferenceConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "mock");
        std::env::remove_var(ENV_TEST_MODE);
        let client = build_client(&InferenceConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "completions");
    }

    #[test]
    fn request_shape_follows_dialect() {
        let mut cfg = InferenceConfig {
            stream: true,
            ..InferenceConfig::default()
        };
        let client = HttpInference::new(cfg.clone()).unwrap();
        let v = serde_json::to_value(client.request("p")).unwrap();
        assert_eq!(v["prompt"], "p");
        assert_eq!(v["stream"], true);
        assert_eq!(v["max_tokens"], 500);

        cfg.dialect = Dialect::Ollama;
        let client = HttpInference::new(cfg).unwrap();
        let v = serde_json::to_value(client.request("p")).unwrap();
        assert_eq!(v["messages"][0]["content"], "p");
        assert_eq!(v["stream"], false);
        assert!(client.endpoint().ends_with("/api/chat"));
    }
}

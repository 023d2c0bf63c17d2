// src/config/mod.rs
//! Runtime configuration: optional `config/bot.toml` for tunables, environment for secrets.

pub mod gazetteer;

use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::error::{BotError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";
pub const ENV_CONFIG_PATH: &str = "BOT_CONFIG_PATH";

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_GOOGLE_CX_ID: &str = "GOOGLE_CX_ID";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub feed: FeedConfig,
    pub inference: InferenceConfig,
    pub illustrator: IllustratorConfig,
    pub ledger: LedgerConfig,
    pub gate: GateConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Rss,
    Search,
    Simulated,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub rss_url: String,
    pub query: String,
    /// Candidate cap; RSS defaults to 3, search to 5.
    pub limit: Option<usize>,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            kind: FeedKind::Rss,
            rss_url: "https://venturebeat.com/feed/".to_string(),
            query: "latest AI agent news".to_string(),
            limit: None,
            timeout_secs: 20,
        }
    }
}

impl FeedConfig {
    pub fn effective_limit(&self) -> usize {
        let fallback = match self.kind {
            FeedKind::Rss => 3,
            FeedKind::Search | FeedKind::Simulated => 5,
        };
        self.limit.unwrap_or(fallback).clamp(1, 10)
    }
}

/// Wire dialect spoken by the local inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// OpenAI-style `/v1/completions`.
    Completions,
    /// OpenAI-style `/v1/chat/completions`.
    Chat,
    /// Ollama `/api/chat`.
    Ollama,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub dialect: Dialect,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            dialect: Dialect::Completions,
            model: "mistralai/mistral-7b-instruct-v0.3".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            stream: false,
            timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IllustratorConfig {
    pub enabled: bool,
    pub base_url: String,
    pub keyword_count: usize,
    pub filler: String,
    pub timeout_secs: u64,
}

impl Default for IllustratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://image.pollinations.ai".to_string(),
            keyword_count: 5,
            filler: "IA".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
    /// Drop entries older than this many days on load. `None` keeps everything.
    pub retention_days: Option<i64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("noticias_publicadas.json"),
            retention_days: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BotConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading bot config from {}", path.display()))?;
        let mut cfg: BotConfig = toml::from_str(&data)
            .with_context(|| format!("parsing bot config {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Resolve the config file:
    /// 1) $BOT_CONFIG_PATH (must exist)
    /// 2) config/bot.toml
    /// 3) built-in defaults
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        Ok(Self::default())
    }

    fn sanitize(&mut self) {
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            self.inference.temperature = InferenceConfig::default().temperature;
        }
        if self.inference.max_tokens == 0 {
            self.inference.max_tokens = InferenceConfig::default().max_tokens;
        }
        self.inference.base_url = self.inference.base_url.trim_end_matches('/').to_string();
        self.illustrator.base_url = self.illustrator.base_url.trim_end_matches('/').to_string();
        self.telegram.api_base = self.telegram.api_base.trim_end_matches('/').to_string();
        if self.illustrator.keyword_count == 0 {
            self.illustrator.keyword_count = 1;
        }
        if self.illustrator.filler.trim().is_empty() {
            self.illustrator.filler = IllustratorConfig::default().filler;
        }
        if self.gate.timeout_secs == 0 {
            self.gate.timeout_secs = GateConfig::default().timeout_secs;
        }
    }
}

/// Bot token + target chat. Required before anything is published.
#[derive(Clone)]
pub struct TelegramCredentials {
    pub token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("token_len", &self.token.len())
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramCredentials {
    pub fn from_env() -> Result<Self> {
        let token = non_empty_env(ENV_TELEGRAM_TOKEN);
        let chat_id = non_empty_env(ENV_TELEGRAM_CHAT_ID);
        match (token, chat_id) {
            (Some(token), Some(chat_id)) => Ok(Self { token, chat_id }),
            _ => Err(BotError::Config(format!(
                "missing {ENV_TELEGRAM_TOKEN} or {ENV_TELEGRAM_CHAT_ID}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchCredentials {
    pub api_key: String,
    pub cx_id: String,
}

impl SearchCredentials {
    /// `None` when either variable is absent; callers fall back to simulated results.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            api_key: non_empty_env(ENV_GOOGLE_API_KEY)?,
            cx_id: non_empty_env(ENV_GOOGLE_CX_ID)?,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

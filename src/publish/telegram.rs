// src/publish/telegram.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::format::{plan_delivery, Delivery, OutgoingMessage};
use super::Publisher;
use crate::config::{TelegramConfig, TelegramCredentials};
use crate::error::{BotError, Result};

const PARSE_MODE: &str = "Markdown";

/// Telegram Bot API publisher (`sendMessage` / `sendPhoto`). No retries.
#[derive(Clone)]
pub struct TelegramPublisher {
    client: Client,
    api_base: String,
    creds: TelegramCredentials,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramPublisher {
    pub fn new(cfg: &TelegramConfig, creds: TelegramCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| BotError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            creds,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.creds.token, method)
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.creds.chat_id,
            text,
            parse_mode: PARSE_MODE,
            disable_web_page_preview: false,
        };
        let rsp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::network("telegram", e.without_url()))?;
        check(rsp).await
    }

    pub async fn send_photo(&self, png: Vec<u8>, caption: &str) -> Result<()> {
        let photo = Part::bytes(png)
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| BotError::network("telegram", e.without_url()))?;
        let form = Form::new()
            .text("chat_id", self.creds.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", PARSE_MODE)
            .part("photo", photo);
        let rsp = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::network("telegram", e.without_url()))?;
        check(rsp).await
    }
}

/// Both the HTTP status and the `ok` flag must confirm delivery.
async fn check(rsp: reqwest::Response) -> Result<()> {
    let status = rsp.status();
    let parsed: Option<ApiResponse> = rsp.json().await.ok();
    match parsed {
        Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
        Some(ApiResponse { description, .. }) => Err(BotError::network(
            "telegram",
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                description.unwrap_or_else(|| "request rejected".into())
            ),
        )),
        None => Err(BotError::network(
            "telegram",
            format!("HTTP {} with unreadable body", status.as_u16()),
        )),
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn publish(&self, message: &OutgoingMessage) -> Result<()> {
        for delivery in plan_delivery(message) {
            match delivery {
                Delivery::Photo { caption } => {
                    let png = message.image.clone().unwrap_or_default();
                    self.send_photo(png, &caption).await?;
                }
                Delivery::Text(text) => self.send_message(&text).await?,
            }
        }
        tracing::info!(chat_id = %self.creds.chat_id, "message delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

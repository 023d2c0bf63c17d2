// src/publish/mod.rs
//! Outbound side: message rendering and the channel publisher.

pub mod format;
pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;

pub use format::{render_message, OutgoingMessage};
pub use telegram::TelegramPublisher;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver the message. `Ok` means the channel confirmed every part.
    async fn publish(&self, message: &OutgoingMessage) -> Result<()>;
    fn name(&self) -> &'static str;
}

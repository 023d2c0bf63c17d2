// src/error.rs
//! Error taxonomy shared by every stage of the bot.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// Feed, search, inference, image or publish call failed on the wire.
    #[error("network error ({context}): {message}")]
    Network { context: &'static str, message: String },

    /// Inference reply is missing the fields or sections we asked for.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Ledger read or write failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Missing credentials or invalid configuration; fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    #[error("inference gate not acquired within {0:?}")]
    GateTimeout(std::time::Duration),

    #[error("selection index {index} out of range (1..={available})")]
    Selection { index: usize, available: usize },
}

impl BotError {
    pub fn network(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Network {
            context,
            message: err.to_string(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::Network { .. } => "network",
            BotError::MalformedResponse(_) => "malformed_response",
            BotError::Persistence(_) => "persistence",
            BotError::Config(_) => "config",
            BotError::GateTimeout(_) => "gate_timeout",
            BotError::Selection { .. } => "selection",
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod error;
pub mod feed;
pub mod illustrate;
pub mod inference;
pub mod keywords;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod summarize;

pub use crate::api::create_router;
pub use crate::error::{BotError, Result};
pub use crate::pipeline::{Completion, PublishPipeline, RunOutcome, SelectionPolicy, Stage};

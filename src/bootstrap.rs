// src/bootstrap.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::gazetteer::Gazetteer;
use crate::config::{BotConfig, SearchCredentials, TelegramCredentials};
use crate::feed::build_source;
use crate::illustrate::{HttpImageGenerator, IllustrationService};
use crate::inference::gate::{GatedClient, InferenceGate};
use crate::inference::{build_client, DynInference};
use crate::keywords::CompositeExtractor;
use crate::ledger::PublicationLedger;
use crate::pipeline::PublishPipeline;
use crate::publish::TelegramPublisher;
use crate::summarize::Summarizer;

/// Everything a command needs, wired from config and credentials.
pub struct Runtime {
    pub pipeline: PublishPipeline,
    /// Ungated client, for callers that manage the gate themselves (chat).
    pub client: DynInference,
    pub gate: InferenceGate,
}

impl Runtime {
    pub fn assemble(
        cfg: &BotConfig,
        gazetteer: Gazetteer,
        telegram: TelegramCredentials,
        search: Option<SearchCredentials>,
    ) -> anyhow::Result<Self> {
        // Safe diagnostics only: no tokens.
        info!(
            feed = ?cfg.feed.kind,
            dialect = ?cfg.inference.dialect,
            model = %cfg.inference.model,
            illustrate = cfg.illustrator.enabled,
            ledger = %cfg.ledger.path.display(),
            "runtime config"
        );

        let client = build_client(&cfg.inference)?;
        let gate = InferenceGate::new(Duration::from_secs(cfg.gate.timeout_secs));
        let gated: DynInference = Arc::new(GatedClient::new(client.clone(), gate.clone()));

        let source = build_source(&cfg.feed, search)?;
        let ledger = PublicationLedger::load(&cfg.ledger.path, cfg.ledger.retention_days);
        let publisher = TelegramPublisher::new(&cfg.telegram, telegram)?;

        let mut pipeline = PublishPipeline::new(
            Arc::from(source),
            ledger,
            Summarizer::new(gated.clone()),
            Arc::new(publisher),
        )
        .with_limit(cfg.feed.effective_limit())
        .with_retention(cfg.ledger.retention_days);

        if cfg.illustrator.enabled {
            let extractor = CompositeExtractor::standard(
                &gazetteer,
                gated,
                cfg.illustrator.keyword_count,
                &cfg.illustrator.filler,
            );
            let service = IllustrationService::new(
                Arc::new(extractor),
                Arc::new(gazetteer),
                Arc::new(HttpImageGenerator::new(&cfg.illustrator)?),
            );
            pipeline = pipeline.with_illustrator(Arc::new(service));
        }

        Ok(Self {
            pipeline,
            client,
            gate,
        })
    }
}

// src/chat.rs
//! Interactive terminal sessions: `pick` (choose one item by number) and `chat`
//! (free text to the model plus a few commands).

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::feed::types::NewsItem;
use crate::inference::gate::InferenceGate;
use crate::inference::DynInference;
use crate::pipeline::{Completion, PublishPipeline, RunOutcome, SelectionPolicy};

pub const BUSY_NOTICE: &str = "⌛ Estoy generando tu respuesta, un momento...";

const HELP: &str = "Comandos: `publicar N` / `publish N`, `actualizar` / `refresh`, \
                    `salir` / `exit` / `q`. Cualquier otro texto se envía al modelo.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Refresh,
    Publish(usize),
    Prompt(String),
    Invalid(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        let lower = trimmed.to_lowercase();
        let mut words = lower.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("salir" | "exit" | "q" | "quit"), None, _) => Command::Quit,
            (Some("refresh" | "actualizar"), None, _) => Command::Refresh,
            (Some("publish" | "publicar"), Some(n), None) => match n.parse() {
                Ok(n) => Command::Publish(n),
                Err(_) => Command::Invalid(format!("número no válido: {n}")),
            },
            (Some("publish" | "publicar"), None, _) => {
                Command::Invalid("indica el número de la noticia".into())
            }
            _ => Command::Prompt(trimmed.to_string()),
        }
    }
}

pub fn format_candidates(items: &[NewsItem]) -> String {
    if items.is_empty() {
        return "No hay noticias nuevas.\n".to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, it)| format!("{}. {}\n   {}\n", i + 1, it.title, it.link))
        .collect()
}

pub fn describe(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed(Completion::Published { title, link }) => {
            format!("✅ Publicado: {title} ({link})")
        }
        RunOutcome::Completed(Completion::NoOp) => "Nada nuevo que publicar.".to_string(),
        RunOutcome::Aborted { stage, error } => {
            format!("❌ Abortado en {}: {error}", stage.as_str())
        }
    }
}

/// Show the list, read one number, publish that item.
pub async fn pick<R, W>(
    pipeline: &mut PublishPipeline,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<RunOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let items = pipeline.candidates().await;
    output.write_all(format_candidates(&items).as_bytes()).await?;
    if items.is_empty() {
        output.flush().await?;
        return Ok(RunOutcome::Completed(Completion::NoOp));
    }
    output.write_all(b"Elige una noticia: ").await?;
    output.flush().await?;

    let mut line = String::new();
    input.read_line(&mut line).await?;
    let index = line.trim().parse::<usize>().unwrap_or(0);
    let outcome = pipeline.run_with(&items, SelectionPolicy::Index(index)).await;
    output
        .write_all(format!("{}\n", describe(&outcome)).as_bytes())
        .await?;
    output.flush().await?;
    Ok(outcome)
}

/// Line-oriented chat over any reader/writer pair.
pub struct ChatSession<'a, R, W> {
    pipeline: &'a mut PublishPipeline,
    client: DynInference,
    gate: InferenceGate,
    input: R,
    output: W,
    items: Vec<NewsItem>,
}

impl<'a, R, W> ChatSession<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// `client` must be the ungated client; the session takes the gate itself so it can
    /// print the busy notice before waiting.
    pub fn new(
        pipeline: &'a mut PublishPipeline,
        client: DynInference,
        gate: InferenceGate,
        input: R,
        output: W,
    ) -> Self {
        Self {
            pipeline,
            client,
            gate,
            input,
            output,
            items: Vec::new(),
        }
    }

    async fn say(&mut self, text: &str) -> anyhow::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        if !text.ends_with('\n') {
            self.output.write_all(b"\n").await?;
        }
        self.output.flush().await?;
        Ok(())
    }

    async fn refresh(&mut self) -> anyhow::Result<()> {
        self.items = self.pipeline.candidates().await;
        let listing = format_candidates(&self.items);
        self.say(&listing).await
    }

    async fn answer(&mut self, prompt: &str) -> anyhow::Result<()> {
        let _permit = match self.gate.try_acquire() {
            Some(p) => p,
            None => {
                self.say(BUSY_NOTICE).await?;
                match self.gate.acquire(|| ()).await {
                    Ok(p) => p,
                    Err(e) => return self.say(&format!("❌ {e}")).await,
                }
            }
        };
        let reply = match self.client.complete(prompt).await {
            Ok(text) => text,
            Err(e) => format!("❌ {e}"),
        };
        self.say(&reply).await
    }

    /// Runs until a quit command or end of input.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.say(HELP).await?;
        self.refresh().await?;

        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line).await? == 0 {
                break;
            }
            match Command::parse(&line) {
                Command::Quit => {
                    self.say("👋 Hasta luego.").await?;
                    break;
                }
                Command::Refresh => self.refresh().await?,
                Command::Publish(n) => {
                    let items = self.items.clone();
                    let outcome = self
                        .pipeline
                        .run_with(&items, SelectionPolicy::Index(n))
                        .await;
                    self.say(&describe(&outcome)).await?;
                    if outcome.is_published() {
                        self.refresh().await?;
                    }
                }
                Command::Prompt(text) => self.answer(&text).await?,
                Command::Invalid(msg) => self.say(&format!("{msg}. {HELP}")).await?,
                Command::Empty => {}
            }
        }
        Ok(())
    }
}

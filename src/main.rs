//! ai-news-bot: fetch AI news, summarize it with a local model, illustrate it and publish it once.
//!
//! Subcommands: `run` (automatic), `pick` (choose by number), `chat` (interactive), `serve` (HTTP).

use std::net::SocketAddr;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_bot::api::{create_router, AppState};
use ai_news_bot::bootstrap::Runtime;
use ai_news_bot::chat::{self, ChatSession};
use ai_news_bot::config::gazetteer::load_gazetteer_default;
use ai_news_bot::config::{BotConfig, SearchCredentials, TelegramCredentials};
use ai_news_bot::metrics::Metrics;
use ai_news_bot::{RunOutcome, SelectionPolicy};

#[derive(Parser)]
#[command(name = "ai-news-bot", version, about)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Publish the first (or a random) unpublished item and exit.
    Run {
        #[arg(long)]
        random: bool,
    },
    /// List unpublished items and publish the one chosen by number.
    Pick,
    /// Interactive session: free text goes to the model, plus list/publish commands.
    Chat,
    /// HTTP trigger: `GET /` runs the pipeline once.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
        #[arg(long)]
        random: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_news_bot=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn policy(random: bool) -> SelectionPolicy {
    if random {
        SelectionPolicy::Random
    } else {
        SelectionPolicy::First
    }
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed(_) => ExitCode::SUCCESS,
        RunOutcome::Aborted { .. } => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.json);

    let cfg = BotConfig::load_default().context("loading bot config")?;
    let gazetteer = load_gazetteer_default().context("loading gazetteer")?;
    // Missing Telegram credentials end the process before any network call.
    let telegram = TelegramCredentials::from_env()?;
    let search = SearchCredentials::from_env();

    let command = cli.command.unwrap_or(Command::Run { random: false });
    let metrics = match &command {
        Command::Serve { .. } => Metrics::init()?,
        _ => Metrics::detached(),
    };

    let Runtime {
        mut pipeline,
        client,
        gate,
    } = Runtime::assemble(&cfg, gazetteer, telegram, search)?;

    match command {
        Command::Run { random } => {
            let outcome = pipeline.run(policy(random)).await;
            println!("{}", chat::describe(&outcome));
            Ok(exit_code(&outcome))
        }
        Command::Pick => {
            let mut stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            let outcome = chat::pick(&mut pipeline, &mut stdin, &mut stdout).await?;
            Ok(exit_code(&outcome))
        }
        Command::Chat => {
            let stdin = BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            ChatSession::new(&mut pipeline, client, gate, stdin, stdout)
                .run()
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { addr, random } => {
            let router = create_router(AppState::new(pipeline, policy(random)), &metrics);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(%addr, "serving");
            axum::serve(listener, router).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proofchat_core::{Config, HttpSubmissionClient};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const LOG_ENV: &str = "PROOFCHAT_LOG";

#[derive(Parser)]
#[command(name = "proofchat")]
#[command(about = "Chat with an informal proof assistant about formal statements")]
#[command(version)]
struct Cli {
    /// Reasoning backend URL (overrides config and PROOFCHAT_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Knowledge base label to start with (e.g. lm_theory)
    #[arg(long, global = true)]
    kb: Option<String>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Print the backend's tactic status and exit
    Tactics,
}

/// Log to a file under the data dir; the terminal belongs to the TUI.
fn init_logging(debug: bool) -> Result<WorkerGuard> {
    let log_dir = dirs::data_dir()
        .or_else(dirs::config_dir)
        .context("Could not determine a data directory for logs")?
        .join("proofchat");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "proofchat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.debug)?;

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {}", e);
        Config::new()
    });
    let backend_url = cli
        .backend_url
        .clone()
        .unwrap_or_else(|| config.resolved_backend_url());
    let client = HttpSubmissionClient::with_timeout(&backend_url, config.request_timeout())?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Tactics => print_tactics(&client).await,
        Commands::Chat => {
            run_chat(client, backend_url, cli.kb.as_deref(), config.knowledge_base.as_deref()).await
        }
    }
}

async fn print_tactics(client: &HttpSubmissionClient) -> Result<()> {
    let status = client
        .tactics_status()
        .await
        .with_context(|| format!("Is the backend running at {}?", client.base_url()))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// An explicit `kb` wins over the `remembered` selection.
async fn run_chat(
    client: HttpSubmissionClient,
    backend_url: String,
    kb: Option<&str>,
    remembered: Option<&str>,
) -> Result<()> {
    info!(%backend_url, "starting chat");

    let mut events = EventHandler::new();
    let mut app = App::new(Arc::new(client), events.sender(), backend_url, kb, remembered)?
        .with_persisted_selection();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("chat closed");
    result
}

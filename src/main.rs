use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

mod app;
mod client;
mod config;
mod handler;
mod session;
mod tui;
mod ui;

use app::App;
use client::ChatApi;
use config::Storage;
use session::ChatSession;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "chatbot")]
#[command(about = "Terminal chat widget with AI-suggested quick replies")]
struct Cli {
    /// Base URL of the chat backend
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// Log file path (defaults to chatbot.log in the config directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_file)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let storage = Storage::open()?;
    let api = ChatApi::new(&cli.url);
    let mut app = App::new(api, ChatSession::new(storage));

    // Initial quick replies, fetched right after the welcome message
    app.spawn_refresh();

    let mut events = EventHandler::new();
    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(app, frame))?;

        if app.should_quit {
            return Ok(());
        }

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => return Ok(()),
        }
    }
}

/// Log to a file; the terminal itself belongs to the TUI. Level comes from
/// RUST_LOG, defaulting to info.
fn init_logging(log_file: Option<PathBuf>) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let path = match log_file {
        Some(path) => path,
        None => dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
            .join("chatbot-tui")
            .join("chatbot.log"),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

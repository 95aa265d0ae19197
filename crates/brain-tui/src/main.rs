use std::path::PathBuf;
use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use brain_core::Config;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "brain")]
#[command(about = "Terminal client for the brain system chat server")]
#[command(version)]
struct Cli {
    /// Base URL of the brain server (overrides BRAIN_SERVER_URL and the config file)
    #[arg(short, long)]
    server_url: Option<String>,
    /// Write logs here instead of the default data directory
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match cli.log_file {
        Some(path) => path,
        None => logging::default_log_path()?,
    };
    logging::init(&log_path)?;

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Could not load config, using defaults: {}", e);
        Config::new()
    });
    let server_url = config.server_url(cli.server_url.as_deref());
    info!(%server_url, "starting brain client");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(&config, &server_url);
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if let Err(e) = &result {
        warn!("exited with error: {:#}", e);
    }
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
        app.poll_tasks().await?;
    }

    info!("shutting down");
    Ok(())
}

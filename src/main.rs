#![forbid(unsafe_code)]

mod alert;
mod board;
mod check_state;
mod client;
mod config;
mod constants;
mod dashboard;
mod drag;
mod geometry;
mod gui;
mod poller;
mod sound;
mod source;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use board::{Board, PollingContext};
use client::MeerkatClient;
use config::Settings;
use dashboard::Dashboard;
use gui::Mode;
use poller::{PollEvent, PollerDeps};
use sound::SoundPlayer;

#[derive(Debug, Parser)]
#[command(name = "wallboard", version, about = "Monitoring wallboard editor and viewer")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dashboard server base URL, overrides the config file
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List dashboards, optionally only titles containing FILTER
    List {
        filter: Option<String>,
        /// Only dashboards carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Open a dashboard in the editor
    Edit { slug: String },
    /// Open a dashboard read-only
    View { slug: String },
    /// Poll a dashboard's checks and play alerts without a window
    Watch { slug: String },
    /// Create an empty dashboard and print its slug
    Create { title: String },
    /// Delete a dashboard
    Delete { slug: String },
    /// Upload a file (usually an alert sound) and print its URL
    Upload { file: PathBuf },
}

/// LOG_LEVEL wins over the config file; unknown names mean info
fn resolve_level(env_level: Option<&str>, config_level: &str) -> TraceLevel {
    match env_level.unwrap_or(config_level).to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn subscriber(level: TraceLevel) -> FmtSubscriber {
    FmtSubscriber::builder().with_max_level(level).finish()
}

fn init_tracing(config_level: &str) -> Result<()> {
    let level = resolve_level(std::env::var("LOG_LEVEL").ok().as_deref(), config_level);
    tracing::subscriber::set_global_default(subscriber(level)).context("Failed to install tracing subscriber")
}

async fn list(client: &MeerkatClient, filter: Option<&str>, tag: Option<&str>) -> Result<()> {
    let dashboards = client.list_dashboards(tag).await?;
    let matches = dashboard::filter_by_title(&dashboards, filter.unwrap_or_default());
    if matches.is_empty() {
        println!("No dashboards found");
    }
    for dashboard in matches {
        println!("{}\t{}", dashboard.slug, dashboard.title);
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

/// Headless board: pollers and alerts only, until Ctrl-C
async fn watch(settings: &Settings, client: MeerkatClient, player: Arc<dyn SoundPlayer>, slug: &str) -> Result<()> {
    let dashboard = client.get_dashboard(slug).await?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let polling = PollingContext {
        runtime: Handle::current(),
        deps: PollerDeps {
            source: Arc::new(client),
            player,
            events: tx,
            config: settings.poller_config(),
        },
    };
    let mut board = Board::new(dashboard, Some(polling));
    if board.polling_count() == 0 {
        warn!(%slug, "Dashboard has no configured check widgets, nothing to poll");
    }

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, stopping pollers");
                break;
            }
            Some(event) = events.recv() => {
                if let PollEvent::State { widget, state, acknowledged, .. } = &event
                    && board.status(*widget).map(|s| s.state) != Some(*state)
                {
                    let title = board.element(*widget).map(|e| e.title.clone()).unwrap_or_default();
                    if state.is_healthy() {
                        info!(%widget, %title, %state, acknowledged, "Check state changed");
                    } else {
                        warn!(%widget, %title, %state, acknowledged, "Check state changed");
                    }
                }
                if let Some(message) = board.apply_event(event) {
                    warn!(%slug, %message, "This dashboard isn't updating");
                }
            }
        }
    }

    board.shutdown().await;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config's own log level is unknown until it is read
    let loading = subscriber(resolve_level(std::env::var("LOG_LEVEL").ok().as_deref(), "info"));
    let mut settings = tracing::subscriber::with_default(loading, || match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    })?;
    if let Some(server) = cli.server {
        settings.server_url = server;
    }
    init_tracing(&settings.log_level)?;

    let client = MeerkatClient::new(
        &settings.server_url,
        Duration::from_secs(settings.fetch_timeout_secs),
    )?;
    let player: Arc<dyn SoundPlayer> = Arc::from(sound::default_player(&settings.server_url));

    match cli.command {
        Command::List { filter, tag } => runtime()?.block_on(list(&client, filter.as_deref(), tag.as_deref())),
        Command::Edit { slug } => gui::run_board(&settings, client, player, &slug, Mode::Edit),
        Command::View { slug } => gui::run_board(&settings, client, player, &slug, Mode::View),
        Command::Watch { slug } => runtime()?.block_on(watch(&settings, client, player, &slug)),
        Command::Create { title } => {
            let slug = runtime()?.block_on(client.create_dashboard(&Dashboard::new(&title)))?;
            println!("{slug}");
            Ok(())
        }
        Command::Delete { slug } => runtime()?.block_on(client.delete_dashboard(&slug)),
        Command::Upload { file } => {
            let url = runtime()?.block_on(client.upload_file(&file))?;
            println!("{url}");
            Ok(())
        }
    }
}

mod action;
mod app;
mod app_state;
mod component;
mod components;
mod controller;
mod display;
mod engine;
mod log_layer;
mod mpv;
mod notifier;
mod poller;
mod session;
mod theme;
mod widgets;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use navi_proto::catalog::CatalogView;
use navi_proto::config::Config;
use navi_proto::subsonic::{CatalogService, SubsonicClient};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::controller::PlaybackController;
use crate::display::{RedrawQueue, REDRAW_QUEUE_CAPACITY};
use crate::engine::MpvEngine;
use crate::poller::{ProgressPoller, POLL_INTERVAL};
use crate::session::SessionState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Terminal client for Subsonic/Navidrome servers, playing through mpv.
#[derive(Debug, Parser)]
#[command(name = "navicli", version)]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "debug,hyper_util=warn,reqwest=warn,hyper=warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Config problems are reported before the terminal is touched
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("navicli: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {:#}", e);
            eprintln!("navicli: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    let keys = config.keys.parse()?;

    let data_dir = navi_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = navi_proto::platform::log_file();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let (redraw, updates) = RedrawQueue::channel(REDRAW_QUEUE_CAPACITY);

    // Allow RUST_LOG override; --log-level otherwise.
    let log_filter = std::env::var("RUST_LOG").unwrap_or(args.log_level);
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(log_layer::UiLogLayer::new(redraw.clone()))
        .init();

    eprintln!("navicli log: {}", log_path.display());
    info!("navicli starting, server {}", config.server_base_url());

    // ── Catalog client ───────────────────────────────────────────────────────
    let service: Arc<dyn CatalogService> = Arc::new(SubsonicClient::new(&config.server)?);
    {
        let service = service.clone();
        tokio::spawn(async move {
            if let Err(e) = service.ping().await {
                warn!("server ping failed: {}", e);
            }
        });
    }

    // ── Audio engine ─────────────────────────────────────────────────────────
    let initial_volume = config.playback.initial_volume;
    let (raw_tx, raw_rx) = mpsc::channel(64);
    let mut driver = mpv::MpvDriver::new();
    let handle = driver.spawn_and_connect(initial_volume, raw_tx).await?;
    let engine = Arc::new(MpvEngine::new(handle));

    // ── Orchestrator ─────────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let session = Arc::new(SessionState::new());
    let catalog = Arc::new(RwLock::new(CatalogView::new(config.playback.page_size)));
    let controller = PlaybackController::new(
        session.clone(),
        catalog,
        service,
        engine.clone(),
        redraw.clone(),
    )
    .with_volume_step(config.playback.volume_step);

    let (engine_tx, engine_rx) = mpsc::channel(16);
    tokio::spawn(engine::pump_events(raw_rx, engine_tx, cancel.clone()));
    tokio::spawn(notifier::run(controller.clone(), engine_rx, cancel.clone()));
    tokio::spawn(
        ProgressPoller::new(session, engine, redraw.clone()).run(POLL_INTERVAL, cancel.clone()),
    );

    controller.set_initial_volume(initial_volume).await;
    let _ = controller.reload_catalog();

    spawn_signal_handler(cancel.clone());

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(controller.clone(), keys, initial_volume, updates, cancel.clone());
    let result = app.run().await;
    cancel.cancel();

    info!("shutting down");
    let _ = controller.shutdown().await;
    driver.shutdown(SHUTDOWN_GRACE).await;
    result
}

/// Cancel everything on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("cannot listen for SIGTERM: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    cancel.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                _ = term.recv() => info!("SIGTERM received"),
                _ = cancel.cancelled() => return,
            }
        }
        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupt received"),
                _ = cancel.cancelled() => return,
            }
        }
        cancel.cancel();
    });
}

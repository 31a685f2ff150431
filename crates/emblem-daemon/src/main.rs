// Emblem daemon - version-control status cache for file-manager emblems
//
// Serves HasWatch/AddWatch/Status/CheckStatus over a Unix socket and pushes
// status change events to connected clients.

use anyhow::Result;
use clap::Parser;
use emblem_config::{ConfigLoader, EmblemConfig};
use emblem_daemon::{DaemonPaths, Server, StatusMonitor};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit codes for different scenarios
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const ALREADY_RUNNING: i32 = 2;
    pub const RUNTIME_ERROR: i32 = 3;
}

#[derive(Parser, Debug)]
#[command(name = "emblemd")]
#[command(about = "Version-control status daemon for file-manager emblems")]
#[command(version)]
struct Args {
    /// Config file path (defaults to ~/.config/emblem/config.toml)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Socket path (overrides config file)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_configuration(&args);

    let level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("Starting emblemd v{}", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    let paths = DaemonPaths::from_config(&config).with_socket(args.socket.clone());
    if let Some(pid) = paths.running_pid() {
        error!("Daemon already running (PID {}, {:?})", pid, paths.pid_file);
        process::exit(exit_codes::ALREADY_RUNNING);
    }

    match run(&config, &paths).await {
        Ok(()) => {
            info!("Daemon stopped");
            process::exit(exit_codes::SUCCESS);
        }
        Err(e) => {
            error!("Daemon failed: {:#}", e);
            process::exit(exit_codes::RUNTIME_ERROR);
        }
    }
}

fn load_configuration(args: &Args) -> Result<EmblemConfig> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(config)
}

async fn run(config: &EmblemConfig, paths: &DaemonPaths) -> Result<()> {
    let monitor = Arc::new(StatusMonitor::from_config(config)?);
    let server = Server::bind(&paths.socket, monitor.clone()).await?;
    paths.claim()?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            let _ = shutdown.send(());
        }
    });

    let result = server.run().await;

    if let Err(e) = tokio::task::spawn_blocking(move || monitor.exit()).await {
        warn!("Monitor shutdown panicked: {}", e);
    }
    paths.release();

    result
}

//! zone-scheduler
//!
//! HTTP service scheduling tasks across resource zones with priority
//! preemption, per-zone availability windows and hot-reloadable config.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zone_scheduler::config::{Durations, ZoneConfig};
use zone_scheduler::scheduler::Scheduler;
use zone_scheduler::state::AppState;
use zone_scheduler::{api, watch};

/// How often the zone config file is checked for changes.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "zone-scheduler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging.
    #[arg(long)]
    debug: bool,

    /// Listen port.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Directory holding config.yaml and durations.yaml.
    #[arg(long, default_value = "./configs")]
    configs: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting zone scheduler");

    let durations_path = cli.configs.join("durations.yaml");
    let durations = Durations::load(&durations_path)
        .with_context(|| format!("failed to load {}", durations_path.display()))?;

    let config_path = cli.configs.join("config.yaml");
    let zones = ZoneConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    info!(
        whitelisted = zones.whitelist.len(),
        blacklisted = zones.blacklist.len(),
        available_zones = zones.available_zones,
        "Configuration loaded"
    );

    let state = AppState::new(Scheduler::new(zones), durations);
    tokio::spawn(watch::watch_config(
        state.clone(),
        config_path,
        CONFIG_POLL_INTERVAL,
    ));

    let app = api::create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutting down");

    Ok(())
}

/// Resolve when the process should stop accepting work.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received interrupt");
    }
}

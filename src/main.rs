use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use skinwatch::aggregator::Aggregator;
use skinwatch::config::LoggingConfig;
use skinwatch::monitors::MonitorRegistry;
use skinwatch::notify::NotifierSet;
use skinwatch::scheduler::{MonitorLoop, ShutdownToken};
use skinwatch::storage::PriceStore;
use skinwatch::AppConfig;

#[derive(Parser)]
#[command(name = "skinwatch", about = "Wear-ranged skin price monitor")]
struct Cli {
    /// Path to the configuration file (default: config/default + config/local)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Missing or malformed configuration is the one fatal startup class.
    let config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _guard = init_logging(&config.logging)?;

    info!("starting skinwatch");
    info!(
        items = config.items.len(),
        interval = config.monitor.interval,
        platforms = ?config.enabled_platforms().map(|(n, _)| n).collect::<Vec<_>>(),
        "configuration loaded"
    );

    let store = PriceStore::connect(&config.database.path)
        .await
        .context("failed to open price store")?;
    let notifiers = NotifierSet::from_config(&config.notifications)
        .context("failed to build notification channels")?;
    if notifiers.is_empty() {
        warn!("no notification channels enabled, alerts will only be logged");
    }
    let registry = MonitorRegistry::from_config(&config)
        .context("failed to build platform adapters")?;
    if registry.is_empty() {
        warn!("no platforms enabled, rounds will be empty");
    }

    let aggregator = Aggregator::new(registry, config.monitor.clone());
    let monitor_loop = MonitorLoop::new(
        aggregator,
        store,
        notifiers,
        config.items.clone(),
        config.monitor.clone(),
        PathBuf::from(&config.logging.summary_dir),
    );

    let token = ShutdownToken::new();
    spawn_signal_handler(token.clone());

    monitor_loop.run(&token).await;
    info!("shutdown complete");
    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.dir, "skinwatch.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("skinwatch={}", config.level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}

/// First interrupt requests a graceful stop at the next checkpoint; a second
/// one is the operator escape hatch and terminates immediately.
fn spawn_signal_handler(token: ShutdownToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("interrupt received, stopping after the current item completes");
        token.request();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt, forcing exit");
            std::process::exit(130);
        }
    });
}

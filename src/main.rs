use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sitewatch::db::services::PgSiteStore;
use sitewatch::db::SiteStore;
use sitewatch::monitoring::{BatchOrchestrator, Prober, ScheduleController, SiteProbe};
use sitewatch::notifications::{LogSender, NotificationSender, TelegramSender};
use sitewatch::server::config::MonitorConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "sitewatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Logging needs log_dir, so configuration errors go to stderr.
    let config = match MonitorConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(version = VERSION, "Starting site monitor.");

    // --- Database ---
    let pool = match PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to the database.");
            return Err(e.into());
        }
    };
    let pg_store = PgSiteStore::new(pool);
    pg_store.ensure_schema().await?;
    let store: Arc<dyn SiteStore> = Arc::new(pg_store);

    // --- Prober and notification channel ---
    let prober: Arc<dyn SiteProbe> = Arc::new(Prober::new(config.probe_policy())?);
    let sender: Arc<dyn NotificationSender> = match config.telegram_bot_token.as_deref() {
        Some(token) => {
            info!("Alerts will be delivered through Telegram.");
            Arc::new(TelegramSender::new(token)?)
        }
        None => {
            warn!("TELEGRAM_BOT_TOKEN is not set. Alerts will only be logged.");
            Arc::new(LogSender)
        }
    };

    // --- Monitoring schedule ---
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        prober,
        sender,
        config.orchestrator_settings(),
    );
    let mut controller =
        ScheduleController::new(store, Arc::new(orchestrator), config.scheduler_settings())?;
    let interval_minutes = controller.start().await;
    info!(interval_minutes, "Site monitor is running. Press Ctrl+C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for the shutdown signal.");
    }
    info!("Shutdown signal received. Waiting for running checks to finish.");
    controller.shutdown().await;
    info!("Site monitor stopped.");
    Ok(())
}

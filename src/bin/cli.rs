//! feedharvest CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use feedharvest::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    services,
    sink::LogSink,
    storage::LocalStorage,
    utils::http,
};

/// feedharvest - Resumable social feed harvester
#[derive(Parser, Debug)]
#[command(
    name = "feedharvest",
    version,
    about = "Resumable social network feed harvester"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "harvest.toml")]
    config: PathBuf,

    /// Directory holding records and cursors
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest every territory on every enabled network
    Harvest {
        /// Only harvest this network
        #[arg(long)]
        network: Option<String>,
    },

    /// Validate the configuration file
    Validate,

    /// List stored harvest cursors
    Cursors,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("feedharvest starting...");

    let config = Config::load_or_default(&cli.config);
    log::info!("Using configuration from {}", cli.config.display());

    let storage = Arc::new(LocalStorage::new(&cli.storage_dir));

    match cli.command {
        Command::Harvest { network } => {
            config.validate()?;

            let client = http::create_async_client(&config.http)?;
            let mut fetchers = services::fetchers_from_config(&config, &client);
            if let Some(only) = &network {
                fetchers.retain(|f| f.network() == only);
            }
            if fetchers.is_empty() {
                return Err(AppError::config("No usable networks to harvest"));
            }

            let sink = config
                .sink
                .enabled
                .then(|| Arc::new(LogSink::new(config.sink.clone())));

            let report =
                pipeline::run_harvest(&config, &fetchers, Arc::clone(&storage), sink.clone()).await;

            if let Some(sink) = sink {
                sink.shutdown().await;
                let stats = sink.stats();
                log::info!(
                    "Log sink: {} accepted, {} rejected, {} dropped, {} segments, {} failed flushes",
                    stats.accepted,
                    stats.rejected,
                    stats.dropped,
                    stats.segments,
                    stats.flush_failures
                );
            }

            for failed in report.failures() {
                log::warn!(
                    "{} stopped after {} pages: {}",
                    failed.key,
                    failed.pages,
                    failed.error.as_deref().unwrap_or("unknown error")
                );
            }
            log::info!(
                "Harvest complete in {}s",
                (report.finished_at - report.started_at).num_seconds()
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} networks, {} territories)",
                config.networks.len(),
                config.territories.len()
            );
        }

        Command::Cursors => {
            let cursors = storage.list_cursors().await?;
            if cursors.is_empty() {
                log::info!("No cursors stored in {}", storage.root().display());
            }
            for cursor in cursors {
                log::info!(
                    "{}: {} pages, {} items, newest {} ({}), recorded {}",
                    cursor.key(),
                    cursor.pages_harvested,
                    cursor.items_harvested,
                    cursor
                        .last_time
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string()),
                    cursor.last_id.as_deref().unwrap_or("-"),
                    cursor.recorded_at.to_rfc3339()
                );
            }
        }
    }

    log::info!("Done!");

    Ok(())
}

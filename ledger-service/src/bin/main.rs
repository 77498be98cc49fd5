use clap::{Parser, Subcommand};
use ledger_service::{LedgerService, LedgerServiceConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ledger Service CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ledger service against PostgreSQL
    Start {
        /// Database URL
        #[arg(short, long)]
        database_url: Option<String>,

        /// Database pool size
        #[arg(short, long)]
        pool_size: Option<u32>,

        /// Log every committed deposit and transfer
        #[arg(short, long)]
        transaction_logging: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("ledger_service={}", cli.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Start { database_url, pool_size, transaction_logging } => {
            let config = match database_url {
                Some(url) => LedgerServiceConfig::new(url, pool_size.unwrap_or(5), transaction_logging),
                None => {
                    let mut config = LedgerServiceConfig::from_env();
                    config.transaction_logging |= transaction_logging;
                    if let Some(size) = pool_size {
                        config.db_pool_size = size;
                    }
                    config
                }
            };

            info!(
                "Starting ledger service with database pool size: {}, transaction logging: {}",
                config.db_pool_size, config.transaction_logging
            );

            let _service = LedgerService::with_config(&config).await?;

            info!("Ledger service started. Press Ctrl+C to stop.");
            match signal::ctrl_c().await {
                Ok(()) => info!("Shutting down ledger service..."),
                Err(err) => error!("Error waiting for Ctrl+C: {}", err),
            }
        }
    }

    Ok(())
}

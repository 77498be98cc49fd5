//! API Gateway for the card ledger

use std::sync::Arc;

use api_gateway::config::AppConfig;
use api_gateway::{app, AppState};
use clap::Parser;
use dotenv::dotenv;
use ledger_service::{LedgerService, StoreType};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

/// Card ledger API server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Listening address; defaults to 127.0.0.1 on $PORT
    #[clap(short, long)]
    addr: Option<String>,

    /// Keep cards and users in PostgreSQL instead of memory
    #[clap(long)]
    postgres: bool,

    /// Emit logs as JSON
    #[clap(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();

    // Initialize logging with debug level when DEBUG=1 env var is set
    let log_level = match std::env::var("DEBUG").as_deref() {
        Ok("1") => Level::DEBUG,
        _ => Level::INFO,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .parse("tower_http=debug,api_gateway=debug,ledger_service=info")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);
    if args.json_logs {
        tracing::subscriber::set_global_default(subscriber.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(subscriber.finish())?;
    }
    debug!("Debug logging enabled");

    let config = AppConfig::new();
    let store_type = if args.postgres {
        StoreType::Postgres(config.database_url.clone())
    } else {
        StoreType::InMemory
    };
    let ledger_service = match LedgerService::with_repository(store_type).await {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to start ledger service: {}", e);
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState { ledger_service });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = app(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(log_level))
                .on_request(DefaultOnRequest::new().level(log_level))
                .on_response(DefaultOnResponse::new().level(log_level)),
        );

    let addr: std::net::SocketAddr = args
        .addr
        .unwrap_or_else(|| format!("127.0.0.1:{}", config.port))
        .parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    // Run until interrupt signal
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

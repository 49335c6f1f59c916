use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bistro::cli::{check_config, Cli, Commands, ConfigCommands};
use bistro::db::SqliteStore;
use bistro::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Variables from a local .env file count as process environment.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = cli.load_config()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(Commands::Config(ConfigCommands::Check)) = cli.command {
        return check_config(&config);
    }

    tracing::info!("Starting Bistro v{}", env!("CARGO_PKG_VERSION"));

    // Open the document store once; every request shares this handle
    let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open document store")?;

    let api_addr = config.listen_address();
    let state = Arc::new(AppState::new(&config, Arc::new(store)));
    let app = bistro::api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("Failed to bind {}", api_addr))?;

    tracing::info!("Bistro is sitting on http://{}", api_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
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

    tracing::info!("Shutdown signal received");
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transit_feed::config::{AppConfig, DEFAULT_CONFIG_PATH};
use transit_feed::fetch::Fetcher;
use transit_feed::ratp::RatpClient;
use transit_feed::scheduler::Scheduler;
use transit_feed::web::{AppState, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("transit_feed=info")),
        )
        .init();

    let path = std::env::var_os("TRANSIT_FEED_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match AppConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = match RatpClient::new(config.api.client_config()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create RATP client");
            return ExitCode::FAILURE;
        }
    };
    info!(base_url = client.base_url(), "Using RATP API");

    let fetcher = Arc::new(Fetcher::new(client));
    let scheduler = Arc::new(Scheduler::new(fetcher));

    for consumer in config.consumers {
        scheduler.start(consumer).await;
    }

    let app = create_router(AppState::new(Arc::clone(&scheduler)));

    let listener = match tokio::net::TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.listen, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.listen, "Transit feed listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await;

    scheduler.shutdown().await;

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

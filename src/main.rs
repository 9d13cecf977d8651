//! Fleet tracker server

use std::sync::Arc;

use fleet_tracker::{
    api::{self, AppState},
    config::AppConfig,
    database::Database,
    errors::TrackerError,
    hub::Hub,
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration, preferring environment variables and config files
    let config = AppConfig::load()?;
    config.hub.validate()?;

    let database = Database::connect(&config.database).await?;
    if !config.seed.is_empty() {
        database.seed(&config.seed).await?;
    }

    let hub = Arc::new(Hub::new(config.hub.session_buffer));
    let app = api::router(AppState::new(database.clone(), hub));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Vehicle tracking server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    database.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
        _ = ctrl_c => info!("Received shutdown signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}

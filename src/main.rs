// src/main.rs
use std::{error::Error, net::SocketAddr, time::Duration};

use axum_server::Handle;
use dotenvy::dotenv;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pollhub::config::Config;
use pollhub::{build_state, connect_store, routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok(); // Load environment variables from .env file

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pollhub=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    info!("Initializing store...");
    let store = connect_store(&config).await?;
    let state = build_state(store, &config).await?;

    let app = routes::create_router(state, config.cors_origin.as_deref());

    let address = SocketAddr::new(config.bind_addr, config.port);
    info!("Server running on {address}");

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

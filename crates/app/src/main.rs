//! Podium - live keynote room server
//!
//! Usage: `podium [config.toml]`. Without an argument the platform config
//! directory is searched, then built-in defaults apply.

use std::path::PathBuf;

use podium_net::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod state;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Podium");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let app_state = match state::AppState::load(config_path.as_deref()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let addr = match app_state.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::start(addr, app_state.hub.clone()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(addr = %addr, "Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    server.shutdown();
    tracing::info!("Podium stopped");
}

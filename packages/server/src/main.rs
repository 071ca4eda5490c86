use std::net::SocketAddr;

use anyhow::Context;
use server::config::AppConfig;
use server::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Failed to load config")?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let state = AppState::from_config(config);
    if state.service.is_configured() {
        info!(
            repository = ?state.config.github.repository,
            branch = %state.config.github.branch,
            "Content repository configured"
        );
    } else {
        warn!("Content repository not configured; asset and health calls will fail");
    }

    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

// Folio - PDF library and annotation server
// Entry point and server setup

use folio::app::AppState;
use folio::config::ServerConfig;
use folio::http;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Folio");

    let config = ServerConfig::from_env()?;
    let state = AppState::initialize(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, http::router(state)).await?;

    Ok(())
}

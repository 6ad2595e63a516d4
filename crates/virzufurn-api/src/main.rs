//! Virzufurn API Server
//!
//! REST API server for the Virzufurn marketplace.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use virzufurn_api::{create_router, state::AppState};
use virzufurn_core::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration comes first so the log level can follow it
    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "virzufurn_api={level},virzufurn_core={level},virzufurn_assets={level},tower_http=debug",
            level = config.logging.level
        )
        .into()
    });

    if config.logging.json_format {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        environment = ?config.server.environment,
        "Starting Virzufurn API"
    );

    // Create application state
    let state = Arc::new(AppState::from_config(config).await?);
    tracing::info!(storage = state.storage_backend, "Storage ready");

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Virzufurn API Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

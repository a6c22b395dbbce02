//! YAP custom fields HTTP server
//!
//! Serves the field engine's read/write API over REST.

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yap_server::{api, config::ServerConfig, engine};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so its log level can seed the filter
    let config = ServerConfig::load()?;
    init_tracing(&config.log_level)?;
    info!("Loaded configuration: {:?}", config);

    let engine = engine::init_engine(&config).await?;
    info!("Field engine initialized");

    let app = api::create_router(Arc::new(engine));

    let addr = config.bind_address();
    info!("Starting server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("  Health check: http://{}/health", addr);
    info!("  Fields API: http://{}/v1/groups/{{group}}/posts/{{post_id}}/fields", addr);
    info!("  Resolve post: POST http://{}/v1/posts/resolve", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "yap_server={level},yap_sdk={level},yap_runtime={level},tower_http=debug",
                    level = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use milaap_store::SqliteStore;
use milaapd::config::Config;
use milaapd::http;
use milaapd::service::MatchService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("milaapd starting");

    let config = Config::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = Arc::new(SqliteStore::open(&config.db_path).await?);
    tracing::info!(db = %config.db_path.display(), "descriptor store opened");

    let service = Arc::new(MatchService::new(
        store,
        config.max_distance,
        config.similarity_bound,
        config.default_limit,
    ));
    let app = http::router(service, Duration::from_secs(config.request_timeout_secs));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        max_distance = config.max_distance,
        "milaapd ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("milaapd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

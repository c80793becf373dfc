use std::sync::Arc;

use anyhow::Context;
use invoicer_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    invoicer_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = invoicer_api::app::services::build_services(&config)
        .await
        .context("failed to initialise the invoice store")?;

    let app = invoicer_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

//! Ollama-compatible gateway server.
//!
//! Configuration comes from the environment; see [`GatewayConfig`].

use anyhow::Context;
use ollama_openai_gateway::client::UpstreamClient;
use ollama_openai_gateway::config::GatewayConfig;
use ollama_openai_gateway::mapping::ModelMapping;
use ollama_openai_gateway::translate::TranslatorSettings;
use ollama_openai_gateway::{logging, server};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = GatewayConfig::from_env().context("invalid configuration")?;
    logging::init(&cfg.log_level, cfg.log_format);

    let mapping = Arc::new(
        ModelMapping::load(cfg.model_mapping_file.as_deref()).context("failed to load model mapping")?,
    );
    let upstream = Arc::new(UpstreamClient::from_config(&cfg).context("failed to build upstream client")?);
    let state = server::AppState::new(upstream, mapping.clone(), TranslatorSettings::from(&cfg));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(
        %addr,
        upstream = %cfg.base_url,
        mapped_models = mapping.len(),
        max_attempts = cfg.max_retries,
        "gateway listening"
    );

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

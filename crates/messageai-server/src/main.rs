//! # messageai-server
//!
//! HTTP backend for the MessageAI client:
//! - **Media uploads** through short-lived signed `PUT` URLs, stored on disk
//!   and served back under `/media`
//! - **Push notification** fan-out to the push gateway
//! - **Per-IP rate limiting** on every route

mod api;
mod config;
mod error;
mod media_store;
mod presign;
mod push;
mod rate_limit;

use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,messageai_server=debug")),
        )
        .init();

    info!("Starting MessageAI server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        media_path = %config.media_storage_path.display(),
        public_base_url = %config.public_base_url,
        upload_url_ttl_secs = config.upload_url_ttl.as_secs(),
        max_upload_size = config.max_upload_size,
        push_gateway = %config.push_gateway_url,
        "Loaded configuration"
    );

    let http_addr = config.http_addr;
    let state = AppState::from_config(config).await?;

    // Evict rate limiter buckets idle for more than 10 minutes.
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = limiter.purge_stale(Duration::from_secs(600)).await;
            if purged > 0 {
                tracing::debug!(purged, "Purged idle rate limit buckets");
            }
        }
    });

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

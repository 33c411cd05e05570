//! HTTP API for the shared reservation document.
//!
//! This server:
//! - Serves the whole reservation document on GET, `[]` when unavailable
//! - Replaces the whole document on POST (last writer wins)
//! - Answers CORS pre-flight requests for browser clients
//! - Persists the document in a local directory, in memory, or in R2

use std::sync::Arc;

use anyhow::Context;
use aws_config::Region;
use aws_sdk_s3::config::{BehaviorVersion, Credentials};
use clap::Parser;
use reservations_core::{BlobStore, DocumentStore, MemoryBlobStore};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod handlers;
mod storage;

use config::{Config, StorageBackend};
use handlers::{router, AppState};
use storage::{LocalBlobStore, R2BlobStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting reservations-server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.host);
    info!("  Port: {}", config.port);
    info!("  Backend: {}", config.storage_backend);

    let store = build_store(&config)?;
    let documents = DocumentStore::new(store, config.document_key());
    info!("  Document key: {}", documents.key());

    let app = router(AppState { documents }, config.max_body_bytes);

    // Bind and serve
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the blob store selected by the configuration.
fn build_store(config: &Config) -> anyhow::Result<Arc<dyn BlobStore>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            warn!("  Memory backend: reservations are lost on restart");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
        StorageBackend::Local => {
            let dir = config.effective_local_storage_dir();
            info!("  Local storage dir: {}", dir.display());
            Ok(Arc::new(LocalBlobStore::new(&dir)))
        }
        StorageBackend::R2 => {
            let endpoint = config
                .effective_r2_endpoint()
                .context("R2 backend needs CLOUDFLARE_ACCOUNT_ID or R2_ENDPOINT")?;
            let bucket = config
                .r2_bucket_name
                .clone()
                .context("R2 backend needs R2_BUCKET_NAME")?;
            let access_key_id = config
                .r2_access_key_id
                .as_deref()
                .context("R2 backend needs R2_ACCESS_KEY_ID")?;
            let secret_access_key = config
                .r2_secret_access_key
                .as_deref()
                .context("R2 backend needs R2_SECRET_ACCESS_KEY")?;

            info!("  R2 endpoint: {}", endpoint);
            info!("  R2 bucket: {}", bucket);
            if config.r2_public_url.is_none() {
                warn!("  R2_PUBLIC_URL not set, document URLs will not be browsable");
            }

            // Create S3 client for R2
            let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "r2");
            let s3_config = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(credentials)
                .region(Region::new("auto"))
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build();
            let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

            Ok(Arc::new(R2BlobStore::new(
                s3_client,
                bucket,
                config.r2_public_url.clone(),
                config.r2_public_acl,
            )))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
        info!("Received SIGTERM, initiating shutdown");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

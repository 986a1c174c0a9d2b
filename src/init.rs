// Initialization utilities
//
// Storage client construction and logging/tracing setup

use anyhow::{Context, Result};
use s3json_config::{LogFormat, LoggingConfig, RuntimeConfig};
use s3json_store::{JsonStore, S3Client, S3Settings, StoreOptions};
use std::sync::Arc;
use tracing::info;

/// S3 connection settings derived from the storage section of the config
pub fn s3_settings(config: &RuntimeConfig) -> S3Settings {
    let storage = &config.storage;
    S3Settings {
        region: storage.region.clone(),
        endpoint: storage.endpoint.clone(),
        force_path_style: storage.force_path_style,
        access_key_id: storage.access_key_id.clone(),
        secret_access_key: storage.secret_access_key.clone(),
    }
}

/// Store call options derived from the list/request sections of the config
pub fn store_options(config: &RuntimeConfig) -> StoreOptions {
    StoreOptions {
        list_page_size: Some(config.list.page_size),
        operation_timeout: config.request.operation_timeout(),
    }
}

/// Build the S3-backed store described by `config`.
///
/// Errors are returned rather than aborting; the host decides whether a
/// missing region or bad credentials are fatal.
pub async fn connect(config: &RuntimeConfig) -> Result<JsonStore<S3Client>> {
    info!(
        "Connecting to S3 storage: bucket={}, region={}",
        config.storage.bucket,
        config.storage.region.as_deref().unwrap_or("<default>")
    );

    if let Some(endpoint) = config.storage.endpoint.as_deref() {
        info!("Using custom S3 endpoint: {}", endpoint);
    }

    let client = S3Client::connect(&s3_settings(config))
        .await
        .context("Failed to initialize S3 client")?;

    Ok(JsonStore::with_options(
        Arc::new(client),
        store_options(config),
    ))
}

/// Initialize tracing/logging from the logging config
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match logging.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

//! s3json - list, read and write JSON objects in S3-compatible buckets
//!
//! This crate ties the configuration loader to the store:
//!
//! ```ignore
//! let config = s3json::RuntimeConfig::load()?;
//! s3json::init_tracing(&config.logging);
//!
//! let store = s3json::connect(&config).await?;
//! let recent = store
//!     .list_recent_keys(&config.storage.bucket, &config.storage.prefix, Duration::from_secs(3600))
//!     .await?;
//! ```

mod init;

pub use init::{connect, init_tracing, s3_settings, store_options};

pub use s3json_config::{
    ListConfig, LogFormat, LoggingConfig, RequestConfig, RuntimeConfig, StorageConfig,
};
pub use s3json_store::{
    is_json_key, is_modified_after, save_local, to_json_pretty, write_file, write_file_atomic,
    BoxError, ClientError, IoPhase, JsonStore, ListPage, ListedObject, MemoryClient,
    ObjectClient, ObjectDescriptor, Operation, S3Client, S3Settings, StoreError, StoreOptions,
    JSON_SUFFIX,
};

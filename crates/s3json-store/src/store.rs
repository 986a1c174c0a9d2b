//! Remote JSON store adapter
//!
//! Lists, filters, reads and writes `.json` objects through an injected
//! [`ObjectClient`]. Every operation is independent; the store holds nothing
//! but the shared client handle and call options.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{with_deadline, ClientError, ObjectClient};
use crate::codec::to_json_pretty;
use crate::error::{Result, StoreError};
use crate::listing::{
    is_json_key, is_modified_after, paginate, ListOptions, ListedObject, ObjectDescriptor,
};

/// Per-store call options
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// `max_keys` sent with each listing request; the store's own limit applies when unset
    pub list_page_size: Option<i32>,
    /// Upper bound for each individual remote call
    pub operation_timeout: Option<Duration>,
}

/// JSON object store over a shared [`ObjectClient`]
pub struct JsonStore<C: ?Sized> {
    client: Arc<C>,
    options: StoreOptions,
}

impl<C: ?Sized> Clone for JsonStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            options: self.options,
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for JsonStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C> JsonStore<C>
where
    C: ObjectClient + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self::with_options(client, StoreOptions::default())
    }

    pub fn with_options(client: Arc<C>, options: StoreOptions) -> Self {
        Self { client, options }
    }

    /// A handle sharing this store's client with a different per-call timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            client: Arc::clone(&self.client),
            options: StoreOptions {
                operation_timeout: Some(timeout),
                ..self.options
            },
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Every object under `prefix`, fetched page by page as the stream is polled.
    ///
    /// Unfiltered; the stream is finite and cannot be restarted.
    pub fn objects<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
    ) -> impl Stream<Item = Result<ListedObject>> + 'a {
        paginate(
            &*self.client,
            bucket,
            prefix,
            ListOptions {
                page_size: self.options.list_page_size,
                timeout: self.options.operation_timeout,
            },
        )
    }

    /// Keys of every JSON object under `prefix`, across all listing pages.
    pub async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .objects(bucket, prefix)
            .try_filter_map(|object| {
                let key = is_json_key(&object.key).then_some(object.key);
                future::ready(Ok(key))
            })
            .try_collect()
            .await
            .inspect_err(|e| {
                warn!(bucket, prefix, error = %e, "Failed to list JSON objects");
            })?;

        debug!(bucket, prefix, count = keys.len(), "Listed JSON objects");
        Ok(keys)
    }

    /// JSON objects under `prefix` modified within the last `window`.
    ///
    /// An object modified exactly `window` ago is excluded. Order follows the
    /// underlying listing and must not be relied on.
    pub async fn list_recent_keys(
        &self,
        bucket: &str,
        prefix: &str,
        window: Duration,
    ) -> Result<Vec<ObjectDescriptor>> {
        self.list_modified_after(bucket, prefix, cutoff_for(Utc::now(), window))
            .await
    }

    /// JSON objects under `prefix` modified strictly after `cutoff`.
    pub async fn list_modified_after(
        &self,
        bucket: &str,
        prefix: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ObjectDescriptor>> {
        let recent: Vec<ObjectDescriptor> = self
            .objects(bucket, prefix)
            .try_filter_map(|object| {
                let descriptor = match object.last_modified {
                    Some(last_modified)
                        if is_json_key(&object.key) && is_modified_after(&object, cutoff) =>
                    {
                        Some(ObjectDescriptor {
                            key: object.key,
                            last_modified,
                        })
                    }
                    _ => None,
                };
                future::ready(Ok(descriptor))
            })
            .try_collect()
            .await
            .inspect_err(|e| {
                warn!(bucket, prefix, error = %e, "Failed to list recent JSON objects");
            })?;

        debug!(
            bucket,
            prefix,
            cutoff = %cutoff,
            count = recent.len(),
            "Listed recent JSON objects"
        );
        Ok(recent)
    }

    /// Full body of `key`.
    pub async fn read_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        match with_deadline(
            self.options.operation_timeout,
            self.client.get_object(bucket, key),
        )
        .await
        {
            Ok(data) => {
                debug!(bucket, key, bytes = data.len(), "Read object");
                Ok(data)
            }
            Err(ClientError::NotFound) => {
                debug!(bucket, key, "Object not found");
                Err(StoreError::not_found(bucket, key))
            }
            Err(source) => {
                warn!(bucket, key, error = %source, "Failed to read object");
                Err(StoreError::read(bucket, key, source))
            }
        }
    }

    /// Upload `data` as `key`, replacing any existing object.
    pub async fn write_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        let size = data.len();

        match with_deadline(
            self.options.operation_timeout,
            self.client.put_object(bucket, key, data),
        )
        .await
        {
            Ok(()) => {
                info!(bucket, key, bytes = size, "Uploaded object");
                Ok(())
            }
            Err(source) => {
                warn!(bucket, key, error = %source, "Failed to upload object");
                Err(StoreError::write(bucket, key, source))
            }
        }
    }

    /// Read `key` and decode it as `T`.
    pub async fn read_json<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<T> {
        let data = self.read_object(bucket, key).await?;
        serde_json::from_slice(&data).map_err(|source| StoreError::Decoding {
            key: key.to_string(),
            source,
        })
    }

    /// Encode `records` as indented JSON and upload them as `key`.
    pub async fn write_json<T: Serialize>(
        &self,
        bucket: &str,
        key: &str,
        records: &[T],
    ) -> Result<()> {
        let data = to_json_pretty(records)?;
        self.write_object(bucket, key, data).await
    }
}

/// `now - window`, saturating at the earliest representable instant.
fn cutoff_for(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

//! In-process object store
//!
//! Behaves like a small S3: buckets must exist before use, listings are
//! lexicographic and paginated, and continuation tokens are opaque to callers.
//! Failures and latency can be injected per operation for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::client::{ClientError, ObjectClient};
use crate::listing::{ListPage, ListedObject};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Client operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Put,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

type Bucket = BTreeMap<String, StoredObject>;

/// [`ObjectClient`] backed by in-memory maps
#[derive(Debug, Default)]
pub struct MemoryClient {
    buckets: RwLock<HashMap<String, Bucket>>,
    failures: RwLock<HashMap<Operation, String>>,
    page_size: Option<usize>,
    latency: Option<Duration>,
    list_calls: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap every listing page at `page_size` entries (at least one)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.create_bucket(bucket);
        self
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default();
    }

    /// Store an object with an explicit modification time, creating the bucket if needed
    pub fn insert(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    data: data.into(),
                    last_modified,
                },
            );
    }

    /// Make every subsequent `operation` fail with a transport error carrying `message`
    pub fn fail(&self, operation: Operation, message: impl Into<String>) {
        self.failures.write().insert(operation, message.into());
    }

    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Number of `list_page` calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map(|b| b.len()).unwrap_or(0)
    }

    async fn enter(&self, operation: Operation) -> Result<(), ClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.read().get(&operation) {
            Some(message) => Err(ClientError::transport(message.clone())),
            None => Ok(()),
        }
    }
}

fn no_such_bucket(bucket: &str) -> ClientError {
    ClientError::transport(format!("NoSuchBucket: bucket '{}' does not exist", bucket))
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, ClientError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.enter(Operation::List).await?;

        let requested = max_keys
            .map(|n| n.max(1) as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let limit = requested.min(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE));

        let buckets = self.buckets.read();
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;

        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation_token.map_or(true, |after| key.as_str() > after));

        let page: Vec<ListedObject> = matching
            .by_ref()
            .take(limit)
            .map(|(key, object)| ListedObject {
                key: key.clone(),
                last_modified: Some(object.last_modified),
                size: object.data.len() as u64,
            })
            .collect();

        // The last key returned doubles as the cursor for the next page
        let next_continuation_token = match matching.next() {
            Some(_) => page.last().map(|object| object.key.clone()),
            None => None,
        };

        Ok(ListPage {
            objects: page,
            next_continuation_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        self.enter(Operation::Get).await?;

        let buckets = self.buckets.read();
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects
            .get(key)
            .map(|object| object.data.clone())
            .ok_or(ClientError::NotFound)
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), ClientError> {
        self.enter(Operation::Put).await?;

        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }
}

//! Storage client seam
//!
//! The adapter only needs three capabilities from an object store: one page
//! of a prefix listing, a whole object body, and an upload with a known
//! length. Anything providing those can back a [`crate::JsonStore`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::listing::ListPage;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by an [`ObjectClient`]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("object does not exist")]
    NotFound,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Transport(#[source] BoxError),
}

impl ClientError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

/// Minimal object-store capability set.
///
/// Implementations must be safe to call concurrently; the store shares one
/// handle across every caller.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Fetch one page of keys under `prefix`, resuming from `continuation_token`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, ClientError>;

    /// Fetch the full body of `key`. The body stream is drained before returning.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError>;

    /// Upload `data` as the body of `key`, declaring its exact length.
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), ClientError>;
}

/// Run a client call, bounded by `timeout` when one is configured.
pub(crate) async fn with_deadline<T, F>(timeout: Option<Duration>, call: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(limit)),
        },
        None => call.await,
    }
}

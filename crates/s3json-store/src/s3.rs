//! S3 client creation and the [`ObjectClient`] implementation over `aws-sdk-s3`.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::client::{ClientError, ObjectClient};
use crate::error::StoreError;
use crate::listing::{ListPage, ListedObject};

/// Connection settings for an S3-compatible endpoint.
///
/// Anything left unset falls back to the AWS default provider chain
/// (environment, profile, IMDS).
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub region: Option<String>,

    /// Custom endpoint (MinIO, LocalStack, R2)
    pub endpoint: Option<String>,

    /// Path-style addressing, required by most self-hosted endpoints
    pub force_path_style: bool,

    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// [`ObjectClient`] over the AWS SDK.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct S3Client {
    client: aws_sdk_s3::Client,
}

impl S3Client {
    /// Resolve AWS configuration and build a client.
    ///
    /// Fails when no region can be resolved, since every request would fail later.
    pub async fn connect(settings: &S3Settings) -> Result<Self, StoreError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "s3json-static",
            ));
        }

        let sdk_config = loader.load().await;
        if sdk_config.region().is_none() {
            return Err(StoreError::connect(
                "no AWS region resolved; set storage.region or AWS_REGION",
            ));
        }

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style)
            .build();

        debug!(
            region = ?sdk_config.region(),
            endpoint = ?settings.endpoint,
            force_path_style = settings.force_path_style,
            "S3 client initialized"
        );

        Ok(Self::from_client(aws_sdk_s3::Client::from_conf(s3_config)))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.client
    }
}

fn sdk_failure<E>(err: &SdkError<E, HttpResponse>) -> ClientError
where
    E: std::error::Error + 'static,
{
    ClientError::transport(DisplayErrorContext(err).to_string())
}

/// Only a missing key is `NotFound`. A 404 carrying another code (`NoSuchBucket`)
/// stays a transport failure; a bare 404 without any code counts as a missing key.
fn classify_get_error(err: SdkError<GetObjectError, HttpResponse>) -> ClientError {
    let status_not_found = err
        .raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false);

    let missing_key = match err.as_service_error() {
        Some(service) if service.is_no_such_key() => true,
        Some(service) => match service.code() {
            Some(code) => code == "NoSuchKey",
            None => status_not_found,
        },
        None => status_not_found,
    };

    if missing_key {
        ClientError::NotFound
    } else {
        sdk_failure(&err)
    }
}

fn to_utc(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, ClientError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token.map(str::to_string))
            .set_max_keys(max_keys)
            .send()
            .await
            .map_err(|e| sdk_failure(&e))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ListedObject {
                    key: key.to_string(),
                    last_modified: object.last_modified().and_then(to_utc),
                    size: object.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();

        let next_continuation_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_continuation_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_get_error)?;

        // Drains the body; the stream is dropped on both paths
        let body = response
            .body
            .collect()
            .await
            .map_err(ClientError::transport)?;

        Ok(body.into_bytes())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), ClientError> {
        let content_length = data.len() as i64;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_failure(&e))?;

        Ok(())
    }
}

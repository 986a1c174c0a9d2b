// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_storage_config(&config.storage)?;
    validate_list_config(&config.list)?;
    validate_request_config(&config.request)?;

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.bucket.is_empty() {
        bail!("storage.bucket is required");
    }

    if config.prefix.starts_with('/') {
        warn!(
            prefix = %config.prefix,
            "storage.prefix starts with '/'; S3 keys rarely do, listings may come back empty"
        );
    }

    if config.access_key_id.is_some() != config.secret_access_key.is_some() {
        bail!("storage.access_key_id and storage.secret_access_key must be set together");
    }

    if let Some(endpoint) = &config.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            bail!("storage.endpoint must be an http(s) URL, got '{}'", endpoint);
        }
    }

    Ok(())
}

fn validate_list_config(config: &ListConfig) -> Result<()> {
    if config.page_size <= 0 {
        bail!("list.page_size must be greater than 0");
    }

    if config.page_size > MAX_LIST_PAGE_SIZE {
        bail!(
            "list.page_size must not exceed {} (S3 ListObjectsV2 limit)",
            MAX_LIST_PAGE_SIZE
        );
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<()> {
    if config.operation_timeout_secs == 0 {
        warn!("request.operation_timeout_secs is 0; remote calls will wait indefinitely");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.storage.bucket = "reports".to_string();
        config
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn requires_bucket() {
        let err = validate_config(&RuntimeConfig::default()).unwrap_err();
        assert!(err.to_string().contains("storage.bucket"));
    }

    #[test]
    fn rejects_page_size_out_of_range() {
        let mut config = valid();
        config.list.page_size = 0;
        assert!(validate_config(&config).is_err());

        config.list.page_size = 1001;
        assert!(validate_config(&config).is_err());

        config.list.page_size = 1000;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn accepts_zero_timeout_as_unbounded() {
        let mut config = valid();
        config.request.operation_timeout_secs = 0;
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.request.operation_timeout(), None);

        config.request.operation_timeout_secs = 10;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_half_credentials_and_bad_endpoint() {
        let mut config = valid();
        config.storage.secret_access_key = Some("secret".to_string());
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.storage.endpoint = Some("localhost:9000".to_string());
        assert!(validate_config(&config).is_err());
    }
}

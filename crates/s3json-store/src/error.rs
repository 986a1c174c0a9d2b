//! Error types for the JSON object store crate

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::client::ClientError;

/// Which step of a local file write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPhase {
    /// Creating or truncating the target (or temporary) file
    Create,
    /// Writing bytes into an open file
    Write,
    /// Moving a fully written temporary file over the target
    Rename,
}

impl IoPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Write => "write",
            Self::Rename => "rename",
        }
    }
}

impl fmt::Display for IoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while encoding records or moving bytes to and from storage
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record could not be represented as JSON
    #[error("Failed to encode records as JSON: {0}")]
    Encoding(#[from] serde_json::Error),

    /// An object body was not valid JSON for the requested type
    #[error("Failed to decode JSON object '{key}': {source}")]
    Decoding {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Local file creation, write or rename failed
    #[error("Failed to {phase} local file '{}': {source}", path.display())]
    Io {
        phase: IoPhase,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing (or one of its continuation pages) failed
    #[error("Failed to list objects in bucket '{bucket}' under prefix '{prefix}': {source}")]
    List {
        bucket: String,
        prefix: String,
        #[source]
        source: ClientError,
    },

    /// The requested key does not exist
    #[error("Object '{key}' not found in bucket '{bucket}'")]
    NotFound { bucket: String, key: String },

    /// Fetching an object failed for a reason other than absence
    #[error("Failed to read object '{key}' from bucket '{bucket}': {source}")]
    Read {
        bucket: String,
        key: String,
        #[source]
        source: ClientError,
    },

    /// Uploading an object failed
    #[error("Failed to write object '{key}' to bucket '{bucket}': {source}")]
    Write {
        bucket: String,
        key: String,
        #[source]
        source: ClientError,
    },

    /// The storage client could not be constructed
    #[error("Failed to initialize storage client: {message}")]
    Connect { message: String },
}

impl StoreError {
    pub fn io(phase: IoPhase, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            phase,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn list(bucket: &str, prefix: &str, source: ClientError) -> Self {
        Self::List {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            source,
        }
    }

    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn read(bucket: &str, key: &str, source: ClientError) -> Self {
        Self::Read {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }

    pub fn write(bucket: &str, key: &str, source: ClientError) -> Self {
        Self::Write {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// True when the error means the object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the underlying remote call hit the configured deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::List { source, .. } | Self::Read { source, .. } | Self::Write { source, .. } => {
                matches!(source, ClientError::Timeout(_))
            }
            _ => false,
        }
    }
}

/// Result type alias for StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::time::Duration;

    #[test]
    fn io_error_names_phase_and_path() {
        let err = StoreError::io(
            IoPhase::Create,
            Path::new("/tmp/out.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.starts_with("Failed to create local file '/tmp/out.json'"));
        assert!(err.source().is_some());
    }

    #[test]
    fn timeout_is_detected_through_operation_errors() {
        let err = StoreError::read("b", "k.json", ClientError::Timeout(Duration::from_secs(1)));
        assert!(err.is_timeout());
        assert!(!err.is_not_found());

        let err = StoreError::not_found("b", "k.json");
        assert!(err.is_not_found());
        assert!(!err.is_timeout());
    }
}

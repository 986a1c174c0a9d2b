//! Local JSON codec
//!
//! Renders records as indented JSON and writes bytes to local files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{IoPhase, Result, StoreError};

/// Encode `records` as a two-space indented JSON array.
pub fn to_json_pretty<T: Serialize>(records: &[T]) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(records).map_err(|e| {
        warn!(error = %e, records = records.len(), "Failed to encode records as JSON");
        StoreError::Encoding(e)
    })
}

/// Create or truncate `path` and write `data` in full.
///
/// The file handle is closed on every return path. On failure the file may be
/// missing or partially written; use [`write_file_atomic`] when readers must
/// never observe a partial file.
pub fn write_file(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    match write_all(path, data, Durability::Flush) {
        Ok(()) => {
            info!(path = %path.display(), bytes = data.len(), "Saved to local file");
            Ok(())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to save local file");
            Err(e)
        }
    }
}

/// Write `data` to a temporary sibling of `path`, sync it to disk, then rename
/// it into place.
///
/// `path` is either left untouched or replaced by the complete contents. The
/// temporary file is removed if any step fails.
pub fn write_file_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let temp = temp_path(path);

    let result = write_all(&temp, data, Durability::Sync).and_then(|()| {
        fs::rename(&temp, path).map_err(|e| StoreError::io(IoPhase::Rename, path, e))
    });

    match result {
        Ok(()) => {
            info!(path = %path.display(), bytes = data.len(), "Saved to local file");
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&temp);
            warn!(path = %path.display(), error = %e, "Failed to save local file");
            Err(e)
        }
    }
}

/// Encode `records` and write them to `path`.
pub fn save_local<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let data = to_json_pretty(records)?;
    write_file(path, &data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Durability {
    Flush,
    /// Data and metadata reach the disk before returning
    Sync,
}

fn write_all(path: &Path, data: &[u8], durability: Durability) -> Result<()> {
    let mut file = File::create(path).map_err(|e| StoreError::io(IoPhase::Create, path, e))?;
    file.write_all(data)
        .and_then(|()| file.flush())
        .and_then(|()| match durability {
            Durability::Sync => file.sync_all(),
            Durability::Flush => Ok(()),
        })
        .map_err(|e| StoreError::io(IoPhase::Write, path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Report {
        name: String,
        count: u32,
        tags: Vec<String>,
    }

    fn reports() -> Vec<Report> {
        vec![
            Report {
                name: "daily".to_string(),
                count: 3,
                tags: vec!["a".to_string()],
            },
            Report {
                name: "weekly".to_string(),
                count: 0,
                tags: vec![],
            },
        ]
    }

    #[test]
    fn encodes_with_two_space_indent() {
        let data = to_json_pretty(&reports()).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("[\n  {\n    \"name\": \"daily\""));
    }

    #[test]
    fn encoded_records_parse_back_equal() {
        let records = reports();
        let data = to_json_pretty(&records).unwrap();
        let decoded: Vec<Report> = serde_json::from_slice(&data).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn empty_sequence_is_an_empty_array() {
        let data = to_json_pretty::<Report>(&[]).unwrap();
        assert_eq!(data, b"[]");
    }

    #[test]
    fn unrepresentable_record_is_an_encoding_error() {
        let mut bad = BTreeMap::new();
        bad.insert((1, 2), "tuple keys have no JSON form");

        let err = to_json_pretty(&[bad]).unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }

    #[test]
    fn write_file_creates_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        write_file(&path, b"first, longer contents").unwrap();
        write_file(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn create_failure_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");

        let err = write_file(&path, b"{}").unwrap_err();
        match err {
            StoreError::Io { phase, path: failed, .. } => {
                assert_eq!(phase, IoPhase::Create);
                assert_eq!(failed, path);
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failure_is_tagged() {
        // /dev/full accepts opens but rejects every write with ENOSPC
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let err = write_file(full, b"{}").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Io {
                phase: IoPhase::Write,
                ..
            }
        ));
    }

    #[test]
    fn save_local_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");

        save_local(&path, &reports()).unwrap();

        let decoded: Vec<Report> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded, reports());
    }

    #[test]
    fn atomic_write_replaces_contents_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, b"old").unwrap();

        write_file_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn synced_write_leaves_complete_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synced.json");

        write_all(&path, b"[1, 2, 3]", Durability::Sync).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"[1, 2, 3]");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn synced_write_failure_is_tagged_as_write() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let err = write_all(full, b"{}", Durability::Sync).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Io {
                phase: IoPhase::Write,
                ..
            }
        ));
    }

    #[test]
    fn failed_atomic_rename_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), b"x").unwrap();

        let err = write_file_atomic(&path, b"{}").unwrap_err();

        assert!(matches!(
            err,
            StoreError::Io {
                phase: IoPhase::Rename,
                ..
            }
        ));
        // Only the pre-existing directory remains
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(path.is_dir());
    }
}

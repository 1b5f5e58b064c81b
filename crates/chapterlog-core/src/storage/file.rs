//! File-backed key-value store: one JSON document per key.

use super::Backend;
use crate::error::PersistenceError;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each key as `<dir>/<escaped key>.json`.
///
/// Keys are escaped injectively: `[A-Za-z0-9.-]` pass through and every
/// other byte (including `_`) becomes `_XX` in upper-case hex, so distinct
/// keys never share a file and no key can leave `dir`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document holding `key`.
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let path = self.key_path(key);

        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, path = ?path, "Key not present");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let value: Value = serde_json::from_str(&json)?;
        debug!(key, path = ?path, size = json.len(), "Loaded value");

        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.key_path(key);
        let json = serde_json::to_vec_pretty(&value)?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.dir.join(format!(".{}.json.tmp", file_stem(key)));
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!(key, path = ?path, size = json.len(), "Saved value");

        Ok(())
    }
}

/// Map a key to a file stem, escaping each byte outside `[A-Za-z0-9.-]` as `_XX`.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{:02X}", byte));
        }
    }
    stem
}

//! Import/export codec for the portable backup file.
//!
//! The file is pretty-printed JSON: `{"entries": [ ... ]}`.

use crate::collection::Collection;
use crate::error::{FormatError, PersistenceError};
use crate::normalize::normalize;
use serde_json::Value;
use tracing::debug;

/// Serialize a collection to the export file format.
pub fn export(collection: &Collection) -> Result<Vec<u8>, PersistenceError> {
    let bytes = serde_json::to_vec_pretty(collection)?;
    debug!(entries = collection.len(), size = bytes.len(), "Exported collection");
    Ok(bytes)
}

/// Parse an export file back into a normalized collection.
///
/// Accepts files written by older versions, including textual chapters.
pub fn import(bytes: &[u8]) -> Result<Collection, FormatError> {
    let raw: Value =
        serde_json::from_slice(bytes).map_err(|e| FormatError::Parse(e.to_string()))?;
    let collection = normalize(&raw)?;
    debug!(entries = collection.len(), size = bytes.len(), "Imported collection");
    Ok(collection)
}

/// Suggested file name for an export taken at `now_ms`.
pub fn export_file_name(now_ms: i64) -> String {
    format!("chapterlog-{}.json", now_ms)
}

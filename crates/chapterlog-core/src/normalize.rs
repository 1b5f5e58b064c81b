//! Normalizer: turn any parsed value claiming to be a collection into one.
//!
//! Runs on every read from storage and every import, so older on-disk
//! shapes (textual chapters, missing ids or timestamps) are upgraded in
//! place instead of by a one-off migration.

use crate::collection::Collection;
use crate::entry::Entry;
use crate::error::FormatError;
use crate::merge::{Applied, LatestById};
use serde_json::Value;
use tracing::{debug, warn};

/// What the normalizer had to change to produce a valid collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizeReport {
    /// Rows in the input list
    pub rows: usize,
    /// Non-object rows removed
    pub dropped: usize,
    /// Rows kept with an empty title
    pub untitled: usize,
    /// Rows folded into an earlier row with the same id
    pub duplicates: usize,
    /// Rows that got a freshly generated id
    pub generated_ids: usize,
    /// Rows whose missing timestamp was set to now
    pub defaulted_timestamps: usize,
    /// Rows with a rewritten id or chapter (numeric id, textual chapter, ...)
    pub coerced: usize,
}

impl NormalizeReport {
    /// Whether the normalized collection should replace what was read.
    ///
    /// Generated ids and timestamps differ on every read, so a store that
    /// does not persist them would hand out a different id each time.
    pub fn needs_write_back(&self) -> bool {
        self.dropped > 0
            || self.duplicates > 0
            || self.generated_ids > 0
            || self.defaulted_timestamps > 0
            || self.coerced > 0
    }
}

/// Normalize a raw value into a [`Collection`].
///
/// Fails only when the value is not an object with an `entries` list. Rows
/// inside the list are repaired rather than rejected: non-object rows are
/// dropped and a row with no usable title keeps an empty title.
pub fn normalize(raw: &Value) -> Result<Collection, FormatError> {
    normalize_with_report(raw).map(|(collection, _)| collection)
}

/// Normalize, also reporting every repair made.
pub fn normalize_with_report(raw: &Value) -> Result<(Collection, NormalizeReport), FormatError> {
    let object = raw
        .as_object()
        .ok_or_else(|| FormatError::NotAnObject(value_kind(raw)))?;
    let rows = object
        .get("entries")
        .and_then(Value::as_array)
        .ok_or(FormatError::MissingEntries)?;

    let mut index = LatestById::with_capacity(rows.len());
    let mut report = NormalizeReport {
        rows: rows.len(),
        ..Default::default()
    };

    for (position, row) in rows.iter().enumerate() {
        if !row.is_object() {
            warn!(position, kind = value_kind(row), "Dropping non-object entry");
            report.dropped += 1;
            continue;
        }

        let (entry, repairs) = Entry::coerce_with_repairs(row);
        if entry.title.is_empty() {
            debug!(position, id = %entry.id, "Keeping entry with empty title");
            report.untitled += 1;
        }
        if repairs.generated_id {
            report.generated_ids += 1;
        }
        if repairs.defaulted_updated_at {
            report.defaulted_timestamps += 1;
        }
        if repairs.converted_id || repairs.coerced_chapter {
            report.coerced += 1;
        }

        if index.apply(entry) != Applied::Inserted {
            report.duplicates += 1;
        }
    }

    if report.dropped > 0 || report.untitled > 0 || report.duplicates > 0 {
        warn!(
            rows = report.rows,
            dropped = report.dropped,
            untitled = report.untitled,
            duplicates = report.duplicates,
            "Repaired collection while normalizing"
        );
    }

    Ok((index.into_collection(), report))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

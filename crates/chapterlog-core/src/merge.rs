//! Merge engine: reconcile two collections by id, newest `updatedAt` wins.

use crate::collection::Collection;
use crate::entry::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Counts from one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Imported ids that were not present before.
    pub added: usize,
    /// Present ids overwritten by a strictly newer import.
    pub replaced: usize,
    /// Imported entries ignored because the present one was as new or newer.
    pub kept: usize,
}

/// Outcome of offering one candidate to a [`LatestById`] index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    Inserted,
    Replaced,
    Kept,
}

/// Latest-by-id index that remembers first-insertion order.
#[derive(Debug, Default)]
pub(crate) struct LatestById {
    positions: HashMap<String, usize>,
    entries: Vec<Entry>,
}

impl LatestById {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert `candidate`, or replace the present entry if the candidate is
    /// strictly newer. Ties keep the present entry.
    pub(crate) fn apply(&mut self, candidate: Entry) -> Applied {
        match self.positions.get(&candidate.id) {
            Some(&pos) if candidate.updated_at > self.entries[pos].updated_at => {
                self.entries[pos] = candidate;
                Applied::Replaced
            }
            Some(_) => Applied::Kept,
            None => {
                self.positions
                    .insert(candidate.id.clone(), self.entries.len());
                self.entries.push(candidate);
                Applied::Inserted
            }
        }
    }

    pub(crate) fn into_collection(self) -> Collection {
        Collection {
            entries: self.entries,
        }
    }
}

/// Merge `imported` into `current`.
pub fn merge(current: Collection, imported: Collection) -> Collection {
    merge_with_report(current, imported).0
}

/// Merge `imported` into `current`, reporting what happened to each import.
///
/// Never drops an id present in either input and never yields two entries
/// with the same id. Merging a collection with itself is a no-op.
pub fn merge_with_report(current: Collection, imported: Collection) -> (Collection, MergeReport) {
    let mut index = LatestById::with_capacity(current.len() + imported.len());
    for entry in current.entries {
        index.apply(entry);
    }

    let mut report = MergeReport::default();
    for entry in imported.entries {
        match index.apply(entry) {
            Applied::Inserted => report.added += 1,
            Applied::Replaced => report.replaced += 1,
            Applied::Kept => report.kept += 1,
        }
    }

    debug!(
        added = report.added,
        replaced = report.replaced,
        kept = report.kept,
        "Merged collections"
    );

    (index.into_collection(), report)
}

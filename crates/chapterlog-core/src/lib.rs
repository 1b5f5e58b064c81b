//! Chapterlog Core
//!
//! Persistent store and merge logic for a reading-progress tracker:
//! - Entry model with tolerant coercion of legacy fields
//! - Normalizer applied on every read and import
//! - Whole-collection store over a pluggable key-value backend
//! - Portable JSON export/import
//! - Newest-wins merge of imported backups

pub mod codec;
mod collection;
mod config;
mod entry;
mod error;
pub mod merge;
mod normalize;
mod repository;
pub mod storage;

pub use collection::Collection;
pub use config::{TrackerConfig, CONFIG_FILE_NAME};
pub use entry::{
    coerce_chapter, generate_id, now_millis, Entry, EntryPatch, FieldUpdate, NewEntry, Repairs,
};
pub use error::{FormatError, PersistenceError, Result, TrackerError, ValidationError};
pub use merge::{merge, merge_with_report, MergeReport};
pub use normalize::{normalize, normalize_with_report, NormalizeReport};
pub use repository::{StoreRepository, DEFAULT_STORE_KEY};
pub use storage::{Backend, FileBackend, MemoryBackend};

//! Store repository: durable load/save of the one collection, plus the
//! load -> mutate -> save operations front ends drive.

use crate::codec;
use crate::collection::Collection;
use crate::entry::{checked_chapter, Entry, EntryPatch, NewEntry};
use crate::error::{PersistenceError, Result, ValidationError};
use crate::merge::{merge_with_report, MergeReport};
use crate::normalize::normalize_with_report;
use crate::storage::Backend;
use serde_json::Value;
use tracing::{debug, info};

/// Key the collection lives under unless configured otherwise.
pub const DEFAULT_STORE_KEY: &str = "chapterlog.store.v1";

/// Owns the persisted collection.
///
/// Every write replaces the whole collection. There is no locking: each
/// mutating method loads, changes and saves, so two callers interleaving
/// those steps lose one of their writes. [`StoreRepository::load`] can write
/// too, when it repairs a legacy document. Callers that share a repository
/// across tasks must serialize their calls themselves.
pub struct StoreRepository<B> {
    backend: B,
    key: String,
}

impl<B: Backend> StoreRepository<B> {
    /// Repository under [`DEFAULT_STORE_KEY`].
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, DEFAULT_STORE_KEY)
    }

    pub fn with_key(backend: B, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the collection, upgrading legacy shapes on the way.
    ///
    /// A missing key is an empty collection. When normalization had to
    /// invent ids or timestamps (or otherwise rewrite rows), the repaired
    /// collection is saved back before returning so later reads see the
    /// same ids.
    pub async fn load(&self) -> Result<Collection> {
        let value = match self.backend.get(&self.key).await? {
            None | Some(Value::Null) => {
                debug!(key = %self.key, "No stored collection, starting empty");
                return Ok(Collection::new());
            }
            Some(value) => value,
        };

        let (collection, report) = normalize_with_report(&value)?;
        if report.needs_write_back() {
            self.save(&collection).await?;
            info!(
                key = %self.key,
                generated_ids = report.generated_ids,
                defaulted_timestamps = report.defaulted_timestamps,
                coerced = report.coerced,
                dropped = report.dropped,
                duplicates = report.duplicates,
                "Upgraded stored collection"
            );
        }

        debug!(key = %self.key, entries = collection.len(), "Loaded collection");
        Ok(collection)
    }

    /// Replace the stored collection.
    pub async fn save(&self, collection: &Collection) -> Result<()> {
        let value = serde_json::to_value(collection).map_err(PersistenceError::from)?;
        self.backend.set(&self.key, value).await?;
        debug!(key = %self.key, entries = collection.len(), "Saved collection");
        Ok(())
    }

    /// Entries newest first.
    pub async fn list_by_recency(&self) -> Result<Vec<Entry>> {
        let collection = self.load().await?;
        Ok(collection.by_recency().into_iter().cloned().collect())
    }

    /// Create and persist a new entry.
    pub async fn add(&self, new_entry: NewEntry) -> Result<Entry> {
        let entry = new_entry.into_entry()?;

        let mut collection = self.load().await?;
        collection.entries.push(entry.clone());
        self.save(&collection).await?;

        info!(id = %entry.id, title = %entry.title, "Added entry");
        Ok(entry)
    }

    /// Apply a partial edit. `Ok(None)` when no entry has this id.
    pub async fn edit(&self, id: &str, patch: EntryPatch) -> Result<Option<Entry>> {
        self.mutate(id, |entry| entry.apply(patch)).await
    }

    /// Set the reading position, clamped at zero.
    pub async fn set_chapter(&self, id: &str, chapter: f64) -> Result<Option<Entry>> {
        let chapter = checked_chapter(chapter)?;
        self.mutate(id, |entry| {
            entry.chapter = chapter;
            entry.touch();
            Ok(true)
        })
        .await
    }

    pub async fn increment(&self, id: &str) -> Result<Option<Entry>> {
        self.mutate(id, |entry| {
            entry.step_chapter(1.0);
            Ok(true)
        })
        .await
    }

    /// Step back one chapter, stopping at zero.
    pub async fn decrement(&self, id: &str) -> Result<Option<Entry>> {
        self.mutate(id, |entry| {
            entry.step_chapter(-1.0);
            Ok(true)
        })
        .await
    }

    /// Remove an entry outright. Returns whether it existed.
    ///
    /// No tombstone is kept, so importing an older backup that still holds
    /// the entry brings it back.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut collection = self.load().await?;
        let Some(removed) = collection.remove(id) else {
            return Ok(false);
        };
        self.save(&collection).await?;

        info!(id = %removed.id, title = %removed.title, "Deleted entry");
        Ok(true)
    }

    /// Drop every entry.
    pub async fn clear(&self) -> Result<()> {
        self.save(&Collection::new()).await?;
        info!(key = %self.key, "Cleared collection");
        Ok(())
    }

    /// Merge an export file into the stored collection.
    ///
    /// The file is parsed before anything is loaded or written, so a bad file
    /// leaves the store untouched.
    pub async fn import_bytes(&self, bytes: &[u8]) -> Result<MergeReport> {
        let imported = codec::import(bytes)?;
        let current = self.load().await?;

        let (merged, report) = merge_with_report(current, imported);
        self.save(&merged).await?;

        info!(
            added = report.added,
            replaced = report.replaced,
            kept = report.kept,
            total = merged.len(),
            "Imported collection"
        );
        Ok(report)
    }

    /// Serialize the stored collection to the export file format.
    pub async fn export_bytes(&self) -> Result<Vec<u8>> {
        let collection = self.load().await?;
        Ok(codec::export(&collection)?)
    }

    async fn mutate<F>(&self, id: &str, f: F) -> Result<Option<Entry>>
    where
        F: FnOnce(&mut Entry) -> std::result::Result<bool, ValidationError>,
    {
        let mut collection = self.load().await?;
        let Some(entry) = collection.get_mut(id) else {
            debug!(id, "No entry with this id");
            return Ok(None);
        };

        let changed = f(entry)?;
        let updated = entry.clone();
        if changed {
            self.save(&collection).await?;
            debug!(id, chapter = updated.chapter, "Updated entry");
        }

        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FieldUpdate;
    use crate::error::{FormatError, TrackerError};
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingBackend;

    #[async_trait]
    impl Backend for FailingBackend {
        async fn get(&self, _key: &str) -> std::result::Result<Option<Value>, PersistenceError> {
            Ok(None)
        }

        async fn set(&self, key: &str, _value: Value) -> std::result::Result<(), PersistenceError> {
            Err(PersistenceError::Backend {
                key: key.to_string(),
                message: "quota exceeded".to_string(),
            })
        }
    }

    fn new_entry(title: &str, chapter: f64) -> NewEntry {
        NewEntry {
            title: title.to_string(),
            chapter,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_missing_key_is_empty() {
        let repo = StoreRepository::new(MemoryBackend::new());
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_empty() {
        let repo = StoreRepository::new(MemoryBackend::new());
        repo.save(&Collection::new()).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.len(), 0);
        assert_eq!(repo.backend().raw(DEFAULT_STORE_KEY), Some(json!({"entries": []})));
    }

    #[tokio::test]
    async fn test_load_upgrades_legacy_document() {
        let backend = MemoryBackend::with_value(
            DEFAULT_STORE_KEY,
            json!({"entries": [{"id": "a", "title": "X", "chapter": "17", "updatedAt": 3}]}),
        );
        let repo = StoreRepository::new(backend);

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.get("a").unwrap().chapter, 17.0);
    }

    #[tokio::test]
    async fn test_legacy_row_keeps_its_id_across_reads() {
        let backend = MemoryBackend::with_value(
            DEFAULT_STORE_KEY,
            json!({"entries": [{"title": "Legacy", "chapter": "4"}]}),
        );
        let repo = StoreRepository::new(backend);

        let listed = repo.list_by_recency().await.unwrap();
        assert_eq!(listed.len(), 1);
        let legacy = listed[0].clone();
        assert_eq!(legacy.chapter, 4.0);

        let stored = repo.backend().raw(repo.key()).unwrap();
        assert_eq!(stored["entries"][0]["id"], json!(legacy.id));
        assert_eq!(stored["entries"][0]["updatedAt"], json!(legacy.updated_at));
        assert!(stored["entries"][0]["chapter"].is_number());

        let bumped = repo.increment(&legacy.id).await.unwrap().unwrap();
        assert_eq!(bumped.id, legacy.id);
        assert_eq!(bumped.chapter, 5.0);

        let reloaded = repo.load().await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(&legacy.id), Some(&bumped));
    }

    #[tokio::test]
    async fn test_clean_load_does_not_write() {
        let backend = MemoryBackend::with_value(
            DEFAULT_STORE_KEY,
            json!({"entries": [{"id": "a", "title": "A", "chapter": 2, "updatedAt": 5, "extra": true}]}),
        );
        let repo = StoreRepository::new(backend);

        repo.load().await.unwrap();
        assert_eq!(repo.backend().raw(DEFAULT_STORE_KEY).unwrap()["entries"][0]["extra"], json!(true));
    }

    #[tokio::test]
    async fn test_load_malformed_document_is_format_error() {
        let backend = MemoryBackend::with_value(DEFAULT_STORE_KEY, json!({"rows": []}));
        let repo = StoreRepository::new(backend);

        let err = repo.load().await.unwrap_err();
        assert!(matches!(err, TrackerError::Format(FormatError::MissingEntries)));
    }

    #[tokio::test]
    async fn test_save_failure_propagates() {
        let repo = StoreRepository::new(FailingBackend);

        let err = repo.add(new_entry("X", 1.0)).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Persistence(PersistenceError::Backend { .. })
        ));
    }

    #[tokio::test]
    async fn test_custom_key() {
        let repo = StoreRepository::with_key(MemoryBackend::new(), "other.v2");
        assert_eq!(repo.key(), "other.v2");
        repo.add(new_entry("X", 1.0)).await.unwrap();

        assert!(repo.backend().raw("other.v2").is_some());
        assert!(repo.backend().raw(DEFAULT_STORE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_add_and_list_by_recency() {
        let backend = MemoryBackend::with_value(
            DEFAULT_STORE_KEY,
            json!({"entries": [
                {"id": "old", "title": "Old", "chapter": 1, "updatedAt": 10},
                {"id": "mid", "title": "Mid", "chapter": 1, "updatedAt": 20},
            ]}),
        );
        let repo = StoreRepository::new(backend);
        let added = repo.add(new_entry("New", 2.0)).await.unwrap();

        let listed = repo.list_by_recency().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![added.id.as_str(), "mid", "old"]);

        repo.increment("old").await.unwrap();
        let listed = repo.list_by_recency().await.unwrap();
        assert_eq!(listed[2].id, "mid");
    }

    #[tokio::test]
    async fn test_add_rejects_blank_title() {
        let repo = StoreRepository::new(MemoryBackend::new());

        let err = repo.add(new_entry("   ", 1.0)).await.unwrap_err();
        assert!(matches!(err, TrackerError::Validation(ValidationError::EmptyTitle)));
        assert!(repo.backend().raw(DEFAULT_STORE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_increment_decrement() {
        let repo = StoreRepository::new(MemoryBackend::new());
        let entry = repo.add(new_entry("X", 1.0)).await.unwrap();

        let bumped = repo.increment(&entry.id).await.unwrap().unwrap();
        assert_eq!(bumped.chapter, 2.0);
        assert!(bumped.updated_at > entry.updated_at);

        repo.decrement(&entry.id).await.unwrap();
        repo.decrement(&entry.id).await.unwrap();
        let floored = repo.decrement(&entry.id).await.unwrap().unwrap();
        assert_eq!(floored.chapter, 0.0);

        assert!(repo.increment("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_chapter() {
        let repo = StoreRepository::new(MemoryBackend::new());
        let entry = repo.add(new_entry("X", 1.0)).await.unwrap();

        let updated = repo.set_chapter(&entry.id, 42.5).await.unwrap().unwrap();
        assert_eq!(updated.chapter, 42.5);

        let clamped = repo.set_chapter(&entry.id, -3.0).await.unwrap().unwrap();
        assert_eq!(clamped.chapter, 0.0);

        let err = repo.set_chapter(&entry.id, f64::INFINITY).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Validation(ValidationError::NonFiniteChapter(_))
        ));
    }

    #[tokio::test]
    async fn test_edit() {
        let repo = StoreRepository::new(MemoryBackend::new());
        let entry = repo
            .add(NewEntry {
                title: "X".to_string(),
                chapter: 4.0,
                url: Some("https://example.com/x".to_string()),
                notes: None,
            })
            .await
            .unwrap();

        let edited = repo
            .edit(
                &entry.id,
                EntryPatch {
                    title: Some("X (remaster)".to_string()),
                    url: FieldUpdate::Clear,
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(edited.title, "X (remaster)");
        assert!(edited.url.is_none());
        assert_eq!(edited.chapter, 4.0);
        assert_eq!(repo.load().await.unwrap().get(&entry.id), Some(&edited));

        let unchanged = repo
            .edit(&entry.id, EntryPatch::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.updated_at, edited.updated_at);

        assert!(repo
            .edit("missing", EntryPatch::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let repo = StoreRepository::new(MemoryBackend::new());
        let a = repo.add(new_entry("A", 1.0)).await.unwrap();
        repo.add(new_entry("B", 1.0)).await.unwrap();

        assert!(repo.delete(&a.id).await.unwrap());
        assert!(!repo.delete(&a.id).await.unwrap());
        assert_eq!(repo.load().await.unwrap().len(), 1);

        repo.clear().await.unwrap();
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_merges_and_reports() {
        let backend = MemoryBackend::with_value(
            DEFAULT_STORE_KEY,
            json!({"entries": [
                {"id": "a", "title": "A", "chapter": 3, "updatedAt": 50},
                {"id": "b", "title": "B", "chapter": 1, "updatedAt": 10},
            ]}),
        );
        let repo = StoreRepository::new(backend);

        let report = repo
            .import_bytes(
                br#"{"entries":[
                    {"id":"a","title":"A","chapter":7,"updatedAt":40},
                    {"id":"b","title":"B","chapter":"9","updatedAt":20},
                    {"id":"c","title":"C","chapter":2,"updatedAt":30}
                ]}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            report,
            MergeReport {
                added: 1,
                replaced: 1,
                kept: 1
            }
        );

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get("a").unwrap().chapter, 3.0);
        assert_eq!(loaded.get("b").unwrap().chapter, 9.0);
        assert_eq!(loaded.get("c").unwrap().chapter, 2.0);
    }

    #[tokio::test]
    async fn test_failed_import_leaves_store_unchanged() {
        let original = json!({"entries": [{"id": "a", "title": "A", "chapter": 3, "updatedAt": 50}]});
        let backend = MemoryBackend::with_value(DEFAULT_STORE_KEY, original.clone());
        let repo = StoreRepository::new(backend);

        let err = repo.import_bytes(br#"{"items":[]}"#).await.unwrap_err();
        assert!(matches!(err, TrackerError::Format(FormatError::MissingEntries)));

        let err = repo.import_bytes(b"{oops").await.unwrap_err();
        assert!(matches!(err, TrackerError::Format(FormatError::Parse(_))));

        assert_eq!(repo.backend().raw(DEFAULT_STORE_KEY), Some(original));
    }

    #[tokio::test]
    async fn test_export_bytes() {
        let repo = StoreRepository::new(MemoryBackend::new());
        let entry = repo.add(new_entry("X", 3.0)).await.unwrap();

        let bytes = repo.export_bytes().await.unwrap();
        let parsed = codec::import(&bytes).unwrap();
        assert_eq!(parsed.get(&entry.id), Some(&entry));
    }
}

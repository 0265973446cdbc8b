//! Single-writer cache store with write-through persistence.

use super::record::{CacheDocument, CacheRecord, CacheStatistics};
use crate::Error;
use chrono::Utc;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cache store handle.
///
/// Clones share the same in-memory document. Each mutation is a full
/// read-modify-persist cycle performed under the lock, so concurrent tasks in
/// one process see a consistent store.
#[derive(Clone, Debug)]
pub struct CacheStore {
    path: Option<PathBuf>,
    doc: Arc<Mutex<CacheDocument>>,
}

impl CacheStore {
    /// Open the store backed by `path`.
    ///
    /// Creates parent directories as needed. A missing file yields an empty
    /// store; an unreadable or corrupt file is logged and also yields an empty
    /// store, which is overwritten on the next mutation.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::cache_io(parent, e))?;
        }

        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<CacheDocument>(&bytes) {
                Ok(doc) => {
                    tracing::info!(path = %path.display(), records = doc.cases.len(), "loaded cache");
                    doc
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cache file is corrupt, starting empty");
                    CacheDocument::empty(Utc::now())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheDocument::empty(Utc::now()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache file unreadable, starting empty");
                CacheDocument::empty(Utc::now())
            }
        };

        Ok(Self { path: Some(path), doc: Arc::new(Mutex::new(doc)) })
    }

    /// Open a store with no backing file, for tests.
    pub fn open_in_memory() -> Self {
        Self { path: None, doc: Arc::new(Mutex::new(CacheDocument::empty(Utc::now()))) }
    }

    /// Backing file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a record by key. Returns None on a miss.
    pub async fn get(&self, key: &str) -> Option<CacheRecord> {
        self.doc.lock().await.cases.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.doc.lock().await.cases.contains_key(key)
    }

    /// Create the record for `key` or shallow-merge `partial` into it, then
    /// persist the whole store.
    ///
    /// Returns the record as stored after the merge.
    pub async fn put_or_merge(&self, key: &str, partial: Map<String, Value>) -> Result<CacheRecord, Error> {
        let mut doc = self.doc.lock().await;
        let now = Utc::now();

        let mut next = doc.clone();
        let record = next
            .cases
            .entry(key.to_string())
            .or_insert_with(|| CacheRecord::new(key, now));
        record.merge(partial, now);
        let merged = record.clone();

        self.persist(&mut next).await?;
        *doc = next;
        tracing::debug!(key, downloaded = merged.flags.downloaded, analyzed = merged.flags.analyzed, "cache record updated");

        Ok(merged)
    }

    /// Delete a record. Returns the removed record, if there was one.
    pub async fn remove(&self, key: &str) -> Result<Option<CacheRecord>, Error> {
        let mut doc = self.doc.lock().await;
        if !doc.cases.contains_key(key) {
            return Ok(None);
        }

        let mut next = doc.clone();
        let removed = next.cases.remove(key);
        self.persist(&mut next).await?;
        *doc = next;
        Ok(removed)
    }

    /// Drop every record.
    pub async fn clear(&self) -> Result<(), Error> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        next.cases.clear();
        self.persist(&mut next).await?;
        *doc = next;
        tracing::info!("cache cleared");
        Ok(())
    }

    /// Snapshot of all records, ordered by key.
    pub async fn records(&self) -> Vec<CacheRecord> {
        self.doc.lock().await.cases.values().cloned().collect()
    }

    /// Counts recomputed from the live record set.
    pub async fn statistics(&self) -> CacheStatistics {
        CacheStatistics::compute(self.doc.lock().await.cases.values())
    }

    /// Write the full document to `path` without changing the backing file.
    pub async fn export_to(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let mut doc = self.doc.lock().await.clone();
        doc.touch(Utc::now());
        write_document(path.as_ref(), &doc).await
    }

    /// Write `doc` to the backing file. Callers swap it into memory only
    /// after this succeeds.
    async fn persist(&self, doc: &mut CacheDocument) -> Result<(), Error> {
        doc.touch(Utc::now());
        match &self.path {
            Some(path) => write_document(path, doc).await,
            None => Ok(()),
        }
    }
}

/// Serialize and replace `path` via a sibling temp file and rename.
async fn write_document(path: &Path, doc: &CacheDocument) -> Result<(), Error> {
    let json = serde_json::to_vec_pretty(doc)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| Error::cache_io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::cache_io(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::key_for;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = CacheStore::open_in_memory();
        assert!(store.get("nonexistent").await.is_none());
        assert!(!store.contains("nonexistent").await);
    }

    #[tokio::test]
    async fn test_put_then_merge() {
        let store = CacheStore::open_in_memory();
        let key = key_for("X v Y", "http://example/case/1");

        store.put_or_merge(&key, map(json!({"a": 1}))).await.unwrap();
        let record = store.put_or_merge(&key, map(json!({"b": 2}))).await.unwrap();

        assert_eq!(record.field("a"), Some(&json!(1)));
        assert_eq!(record.field("b"), Some(&json!(2)));
        assert!(record.updated_at >= record.created_at);
        assert_eq!(store.get(&key).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_statistics_track_flags() {
        let store = CacheStore::open_in_memory();
        store.put_or_merge("a", map(json!({"downloaded": true}))).await.unwrap();
        store
            .put_or_merge("b", map(json!({"downloaded": true, "analyzed": true})))
            .await
            .unwrap();
        store.put_or_merge("c", map(json!({"note": "x"}))).await.unwrap();

        let stats = store.statistics().await;
        assert_eq!(stats, CacheStatistics { total: 3, downloaded: 2, analyzed: 1 });

        store.remove("b").await.unwrap();
        let stats = store.statistics().await;
        assert_eq!(stats, CacheStatistics { total: 2, downloaded: 1, analyzed: 0 });
    }

    #[tokio::test]
    async fn test_write_through_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let store = CacheStore::open(&path).await.unwrap();
        store
            .put_or_merge("k", map(json!({"downloaded": true, "artifact_path": "a.pdf"})))
            .await
            .unwrap();
        drop(store);

        let reopened = CacheStore::open(&path).await.unwrap();
        let record = reopened.get("k").await.unwrap();
        assert!(record.flags.downloaded);
        assert_eq!(record.field("artifact_path"), Some(&json!("a.pdf")));

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["metadata"]["version"], json!("1.0"));
        assert_eq!(raw["statistics"]["downloaded"], json!(1));
        assert!(raw["cases"]["k"].is_object());
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{ this is not json").unwrap();

        let store = CacheStore::open(&path).await.unwrap();
        assert_eq!(store.statistics().await.total, 0);

        store.put_or_merge("k", map(json!({"a": 1}))).await.unwrap();
        let reopened = CacheStore::open(&path).await.unwrap();
        assert_eq!(reopened.statistics().await.total, 1);
    }

    #[tokio::test]
    async fn test_clear_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().join("cache.json")).await.unwrap();
        store.put_or_merge("k", map(json!({"a": 1}))).await.unwrap();

        let export = dir.path().join("export.json");
        store.export_to(&export).await.unwrap();
        let exported: CacheDocument = serde_json::from_slice(&std::fs::read(&export).unwrap()).unwrap();
        assert!(exported.cases.contains_key("k"));

        store.clear().await.unwrap();
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = CacheStore::open(&path).await.unwrap();
        store.put_or_merge("k", map(json!({"a": 1}))).await.unwrap();

        // A directory squatting on the temp file name makes every write fail.
        std::fs::create_dir(dir.path().join("cache.json.tmp")).unwrap();

        let result = store.put_or_merge("k", map(json!({"downloaded": true}))).await;
        assert!(matches!(result, Err(Error::CacheIo { .. })));
        let record = store.get("k").await.unwrap();
        assert!(!record.flags.downloaded);
        assert_eq!(record.field("downloaded"), None);

        assert!(store.put_or_merge("new", map(json!({"a": 2}))).await.is_err());
        assert!(!store.contains("new").await);

        assert!(store.remove("k").await.is_err());
        assert!(store.contains("k").await);
        assert!(store.clear().await.is_err());
        assert_eq!(store.statistics().await.total, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = CacheStore::open_in_memory();
        let other = store.clone();
        other.put_or_merge("k", map(json!({"a": 1}))).await.unwrap();
        assert!(store.contains("k").await);
    }
}

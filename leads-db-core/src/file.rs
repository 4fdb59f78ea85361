//! File-based document store
//!
//! Layout:
//! - `{base}/{collection}/{id}.json` - one pretty-printed JSON object per document
//! - `{base}/.batch-journal.json` - pending batch, present only while a batch is applied
//!
//! Single documents are written to a `.tmp` file and renamed into place.
//! Batches are made all-or-nothing by writing the full operation list to the
//! journal first; [`FileDocumentStore::open`] replays a journal left behind by
//! a crash. Puts and deletes are idempotent, so replaying a partially applied
//! journal converges to the fully applied state.
//!
//! When an operation fails while the process is still alive, the documents
//! already touched are restored from pre-images taken before the journal was
//! written, and the journal is removed. If restoring fails as well the journal
//! stays and the batch reports [`StoreError::BatchInDoubt`].
//!
//! # Concurrency Warning
//!
//! Mutations are serialized inside one process only. Two processes writing to
//! the same base directory can interleave read-modify-write cycles.

use crate::document::{apply_field_writes, validate_key, Document, FieldWrite};
use crate::error::{Result, StoreError};
use crate::store::{BatchOp, DocumentStore, StoreLimits};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const JOURNAL_FILE: &str = ".batch-journal.json";
const DOC_EXTENSION: &str = "json";

/// Document state before a batch touched it
struct PreImage {
    path: PathBuf,
    document: Option<Document>,
}

/// File-based document store
#[derive(Clone)]
pub struct FileDocumentStore {
    base_path: PathBuf,
    limits: StoreLimits,
    /// Serializes mutations within this process
    write_lock: Arc<Mutex<()>>,
}

impl Debug for FileDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDocumentStore")
            .field("base_path", &self.base_path)
            .field("limits", &self.limits)
            .finish()
    }
}

impl FileDocumentStore {
    /// Open (or create) a store rooted at `base_path`, replaying any
    /// interrupted batch.
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            base_path: base_path.into(),
            limits: StoreLimits::default(),
            write_lock: Arc::new(Mutex::new(())),
        };
        tokio::fs::create_dir_all(&store.base_path)
            .await
            .map_err(|e| {
                StoreError::storage(format!(
                    "Failed to create directory {:?}: {}",
                    store.base_path, e
                ))
            })?;
        store.replay_journal().await?;
        Ok(store)
    }

    /// Use different limits than the defaults
    pub fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Get the base path for this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        validate_key("collection", collection)?;
        Ok(self.base_path.join(collection))
    }

    fn doc_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        validate_key("document id", id)?;
        Ok(self
            .collection_path(collection)?
            .join(format!("{id}.{DOC_EXTENSION}")))
    }

    fn journal_path(&self) -> PathBuf {
        self.base_path.join(JOURNAL_FILE)
    }

    /// Read and parse a document file
    async fn read_doc(path: &Path) -> Result<Option<Document>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::storage(format!(
                    "Failed to read {:?}: {}",
                    path, e
                )))
            }
        };
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(doc) => Ok(Some(doc)),
            _ => Err(StoreError::storage(format!(
                "{:?} does not hold a JSON object",
                path
            ))),
        }
    }

    /// Write a JSON file atomically (write to .tmp then rename)
    async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::storage(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await.map_err(|e| {
            StoreError::storage(format!("Failed to write {:?}: {}", tmp_path, e))
        })?;

        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            StoreError::storage(format!(
                "Failed to rename {:?} to {:?}: {}",
                tmp_path, path, e
            ))
        })?;
        Ok(())
    }

    async fn write_doc(path: &Path, doc: &Document) -> Result<()> {
        let content = serde_json::to_string_pretty(doc)?;
        Self::write_atomic(path, &content).await
    }

    async fn remove_file(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::storage(format!(
                "Failed to delete {:?}: {}",
                path, e
            ))),
        }
    }

    async fn apply_op(&self, op: &BatchOp) -> Result<()> {
        match op {
            BatchOp::Put {
                collection,
                id,
                document,
            } => Self::write_doc(&self.doc_path(collection, id)?, document).await,
            BatchOp::Delete { collection, id } => {
                Self::remove_file(&self.doc_path(collection, id)?).await
            }
        }
    }

    async fn apply_ops(&self, ops: &[BatchOp]) -> Result<()> {
        for op in ops {
            self.apply_op(op).await?;
        }
        Ok(())
    }

    /// Current state of every document the batch touches.
    ///
    /// A document whose collection path is not a directory cannot exist.
    async fn capture_pre_images(&self, ops: &[BatchOp]) -> Result<Vec<PreImage>> {
        let mut images = Vec::with_capacity(ops.len());
        for op in ops {
            let path = self.doc_path(op.collection(), op.id())?;
            let collection_dir = self.collection_path(op.collection())?;
            let is_dir = tokio::fs::metadata(&collection_dir)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            let document = if is_dir {
                Self::read_doc(&path).await?
            } else {
                None
            };
            images.push(PreImage { path, document });
        }
        Ok(images)
    }

    /// Undo the applied prefix of a failed batch, newest first.
    async fn roll_back(&self, applied: &[PreImage], cause: StoreError) -> StoreError {
        for image in applied.iter().rev() {
            let restored = match &image.document {
                Some(doc) => Self::write_doc(&image.path, doc).await,
                None => Self::remove_file(&image.path).await,
            };
            if let Err(e) = restored {
                error!(
                    base_path = ?self.base_path,
                    path = ?image.path,
                    error = %e,
                    "Batch rollback failed; journal kept"
                );
                return StoreError::batch_in_doubt(format!("{cause}; rollback failed: {e}"));
            }
        }
        if let Err(e) = Self::remove_file(&self.journal_path()).await {
            return StoreError::batch_in_doubt(format!(
                "{cause}; rolled back but journal not removed: {e}"
            ));
        }
        warn!(
            base_path = ?self.base_path,
            rolled_back = applied.len(),
            error = %cause,
            "Batch failed; rolled back"
        );
        cause
    }

    async fn replay_journal(&self) -> Result<()> {
        let path = self.journal_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let ops: Vec<BatchOp> = serde_json::from_str(&content)?;
        warn!(
            base_path = ?self.base_path,
            op_count = ops.len(),
            "Replaying interrupted batch"
        );
        self.apply_ops(&ops).await?;
        Self::remove_file(&path).await
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Self::read_doc(&self.doc_path(collection, id)?).await
    }

    async fn put(&self, collection: &str, id: &str, document: Document) -> Result<()> {
        let path = self.doc_path(collection, id)?;
        self.limits.check_document(collection, id, &document)?;
        let _guard = self.write_lock.lock().await;
        Self::write_doc(&path, &document).await
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        writes: &[FieldWrite],
    ) -> Result<()> {
        let path = self.doc_path(collection, id)?;
        let _guard = self.write_lock.lock().await;
        let mut doc = Self::read_doc(&path)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("{collection}/{id}")))?;
        apply_field_writes(&mut doc, writes)?;
        self.limits.check_document(collection, id, &doc)?;
        Self::write_doc(&path, &doc).await
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()> {
        let path = self.doc_path(collection, id)?;
        let _guard = self.write_lock.lock().await;
        Self::remove_file(&path).await
    }

    async fn list_docs(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let dir = self.collection_path(collection)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::storage(format!(
                    "Failed to list {:?}: {}",
                    dir, e
                )))
            }
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOC_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(doc) = Self::read_doc(&path).await? {
                docs.push((id.to_string(), doc));
            }
        }
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(collection, count = docs.len(), "Listed documents");
        Ok(docs)
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        self.limits.check_batch(&ops)?;
        for op in &ops {
            self.doc_path(op.collection(), op.id())?;
            if let BatchOp::Put {
                collection,
                id,
                document,
            } = op
            {
                self.limits.check_document(collection, id, document)?;
            }
        }

        let _guard = self.write_lock.lock().await;
        let pre_images = self.capture_pre_images(&ops).await?;
        let journal = self.journal_path();
        Self::write_atomic(&journal, &serde_json::to_string(&ops)?).await?;
        for (applied, op) in ops.iter().enumerate() {
            if let Err(e) = self.apply_op(op).await {
                return Err(self.roll_back(&pre_images[..applied], e).await);
            }
        }
        Self::remove_file(&journal).await
    }

    fn limits(&self) -> StoreLimits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldPath;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_file_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();

        store.put("c", "b", doc(json!({"n": 2}))).await.unwrap();
        store.put("c", "a", doc(json!({"n": 1}))).await.unwrap();

        assert_eq!(store.get("c", "a").await.unwrap().unwrap()["n"], json!(1));
        assert!(dir.path().join("c").join("a.json").exists());

        let listed = store.list_docs("c").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_file_update_fields_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        store.put("c", "s", doc(json!({"items": {}}))).await.unwrap();

        store
            .update_fields(
                "c",
                "s",
                &[FieldWrite::set(FieldPath::new(["items", "x"]), json!({"phone": "1"}))],
            )
            .await
            .unwrap();
        let fetched = store.get("c", "s").await.unwrap().unwrap();
        assert_eq!(fetched["items"]["x"]["phone"], json!("1"));

        store.delete_doc("c", "s").await.unwrap();
        assert!(store.get("c", "s").await.unwrap().is_none());
        let err = store
            .update_fields("c", "s", &[FieldWrite::delete(FieldPath::parse("items.x"))])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_file_batch_applies_and_clears_journal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        store.put("c", "old", Document::new()).await.unwrap();

        store
            .batch(vec![
                BatchOp::put("c", "new_1", doc(json!({"items": {}}))),
                BatchOp::put("c", "new_2", doc(json!({"items": {}}))),
                BatchOp::delete("c", "old"),
            ])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_docs("c")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["new_1", "new_2"]);
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }

    #[tokio::test]
    async fn test_file_open_replays_journal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileDocumentStore::open(dir.path()).await.unwrap();
            store.put("c", "old", Document::new()).await.unwrap();
        }

        // Simulate a crash after the journal was written but before it was applied
        let ops = vec![
            BatchOp::put("c", "fresh", doc(json!({"items": {"a": {"id": "a"}}}))),
            BatchOp::delete("c", "old"),
        ];
        std::fs::write(
            dir.path().join(JOURNAL_FILE),
            serde_json::to_string(&ops).unwrap(),
        )
        .unwrap();

        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        assert!(store.get("c", "old").await.unwrap().is_none());
        assert!(store.get("c", "fresh").await.unwrap().is_some());
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }

    #[tokio::test]
    async fn test_file_failed_batch_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        store.put("c", "old", doc(json!({"v": 1}))).await.unwrap();
        store.put("c", "kept", doc(json!({"v": 1}))).await.unwrap();

        // A plain file where a collection directory is needed fails the second put
        std::fs::write(dir.path().join("blocked"), "not a directory").unwrap();

        let err = store
            .batch(vec![
                BatchOp::put("c", "new", doc(json!({"v": 2}))),
                BatchOp::put("c", "kept", doc(json!({"v": 2}))),
                BatchOp::put("blocked", "x", Document::new()),
                BatchOp::delete("c", "old"),
            ])
            .await
            .unwrap_err();
        assert!(!err.is_in_doubt());

        assert!(store.get("c", "new").await.unwrap().is_none());
        assert_eq!(store.get("c", "kept").await.unwrap().unwrap()["v"], json!(1));
        assert!(store.get("c", "old").await.unwrap().is_some());
        assert!(!dir.path().join(JOURNAL_FILE).exists());

        // Reopening must not resurrect the failed batch
        let reopened = FileDocumentStore::open(dir.path()).await.unwrap();
        assert!(reopened.get("c", "new").await.unwrap().is_none());
        assert!(reopened.get("c", "old").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_rejects_unsafe_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        let err = store.put("c", "../escape", Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_file_enforces_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path())
            .await
            .unwrap()
            .with_limits(StoreLimits {
                max_document_bytes: 32,
                max_batch_ops: 500,
            });
        let err = store
            .put("c", "big", doc(json!({"v": "z".repeat(64)})))
            .await
            .unwrap_err();
        assert!(err.is_too_large());
        assert!(store.get("c", "big").await.unwrap().is_none());
    }
}

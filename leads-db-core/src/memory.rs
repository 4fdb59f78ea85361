//! In-memory document store
//!
//! Stores every collection in a `BTreeMap` behind `Arc<RwLock>`, so clones
//! share state and listing is ordered by id. Limits are enforced exactly as a
//! remote backend would enforce them, and one-shot failures can be injected
//! per operation kind to exercise error paths.

use crate::document::{apply_field_writes, validate_key, Document, FieldWrite};
use crate::error::{Result, StoreError};
use crate::store::{BatchOp, DocumentStore, StoreLimits, StoreOp};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

/// In-memory document store
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    limits: Arc<RwLock<StoreLimits>>,
    /// Pending one-shot failures, consumed in order of injection
    failures: Arc<Mutex<Vec<StoreOp>>>,
}

impl Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.collections.read();
        f.debug_struct("MemoryDocumentStore")
            .field("collection_count", &collections.len())
            .field(
                "document_count",
                &collections.values().map(BTreeMap::len).sum::<usize>(),
            )
            .field("limits", &*self.limits.read())
            .finish()
    }
}

impl MemoryDocumentStore {
    /// Create an empty store with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given limits
    pub fn with_limits(limits: StoreLimits) -> Self {
        let store = Self::default();
        store.set_limits(limits);
        store
    }

    /// Replace the enforced limits. Existing documents are not re-checked.
    pub fn set_limits(&self, limits: StoreLimits) {
        *self.limits.write() = limits;
    }

    /// Make the next call of the given kind fail with a storage error.
    pub fn fail_next(&self, op: StoreOp) {
        self.failures.lock().push(op);
    }

    /// Number of documents in a collection
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn take_failure(&self, op: StoreOp) -> Result<()> {
        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|f| *f == op) {
            failures.remove(pos);
            return Err(StoreError::storage(format!("injected {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.take_failure(StoreOp::Get)?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, document: Document) -> Result<()> {
        self.take_failure(StoreOp::Put)?;
        validate_key("collection", collection)?;
        validate_key("document id", id)?;
        self.limits().check_document(collection, id, &document)?;
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        writes: &[FieldWrite],
    ) -> Result<()> {
        self.take_failure(StoreOp::UpdateFields)?;
        let limits = self.limits();
        let mut collections = self.collections.write();
        let current = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(format!("{collection}/{id}")))?;

        // Apply to a copy so a rejected write leaves the document untouched
        let mut updated = current.clone();
        apply_field_writes(&mut updated, writes)?;
        limits.check_document(collection, id, &updated)?;
        *current = updated;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()> {
        self.take_failure(StoreOp::DeleteDoc)?;
        if let Some(docs) = self.collections.write().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn list_docs(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        self.take_failure(StoreOp::ListDocs)?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        self.take_failure(StoreOp::Batch)?;
        let limits = self.limits();
        limits.check_batch(&ops)?;
        for op in &ops {
            validate_key("collection", op.collection())?;
            validate_key("document id", op.id())?;
            if let BatchOp::Put {
                collection,
                id,
                document,
            } = op
            {
                limits.check_document(collection, id, document)?;
            }
        }

        // Everything validated up front; apply under one write lock
        let mut collections = self.collections.write();
        for op in ops {
            match op {
                BatchOp::Put {
                    collection,
                    id,
                    document,
                } => {
                    collections.entry(collection).or_default().insert(id, document);
                }
                BatchOp::Delete { collection, id } => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    fn limits(&self) -> StoreLimits {
        *self.limits.read()
    }
}

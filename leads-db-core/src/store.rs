//! Document store trait
//!
//! The sharded lead store consumes the underlying document database only
//! through the operation set defined here. Backends must enforce the
//! advertised [`StoreLimits`] so that callers observe size and batch ceilings
//! the same way regardless of where documents live.
//!
//! ## Implementations
//!
//! - [`MemoryDocumentStore`](crate::MemoryDocumentStore): in-memory, for tests and embedding
//! - [`FileDocumentStore`](crate::FileDocumentStore): one JSON file per document

use crate::document::{document_size, Document, FieldWrite};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Default per-document size ceiling (1 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Default maximum number of operations in one batch.
pub const DEFAULT_MAX_BATCH_OPS: usize = 500;

/// Ceilings imposed by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    /// Largest serialized document accepted by `put`, `update_fields` and `batch`
    pub max_document_bytes: usize,
    /// Largest number of operations accepted by `batch`
    pub max_batch_ops: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        }
    }
}

impl StoreLimits {
    /// Fail with `DocumentTooLarge` when `doc` does not fit.
    pub fn check_document(&self, collection: &str, id: &str, doc: &Document) -> Result<()> {
        let size = document_size(doc)?;
        if size > self.max_document_bytes {
            return Err(StoreError::DocumentTooLarge {
                collection: collection.to_string(),
                id: id.to_string(),
                size,
                limit: self.max_document_bytes,
            });
        }
        Ok(())
    }

    /// Fail with `BatchTooLarge` when the batch has too many operations.
    pub fn check_batch(&self, ops: &[BatchOp]) -> Result<()> {
        if ops.len() > self.max_batch_ops {
            return Err(StoreError::BatchTooLarge {
                ops: ops.len(),
                limit: self.max_batch_ops,
            });
        }
        Ok(())
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BatchOp {
    /// Full replace, create-if-absent
    Put {
        collection: String,
        id: String,
        document: Document,
    },
    /// Idempotent delete
    Delete { collection: String, id: String },
}

impl BatchOp {
    pub fn put(collection: impl Into<String>, id: impl Into<String>, document: Document) -> Self {
        BatchOp::Put {
            collection: collection.into(),
            id: id.into(),
            document,
        }
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        BatchOp::Delete {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            BatchOp::Put { collection, .. } | BatchOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BatchOp::Put { id, .. } | BatchOp::Delete { id, .. } => id,
        }
    }
}

/// Operation kinds, used to target injected failures and in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Put,
    UpdateFields,
    DeleteDoc,
    ListDocs,
    Batch,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreOp::Get => "get",
            StoreOp::Put => "put",
            StoreOp::UpdateFields => "update_fields",
            StoreOp::DeleteDoc => "delete_doc",
            StoreOp::ListDocs => "list_docs",
            StoreOp::Batch => "batch",
        };
        f.write_str(name)
    }
}

/// Abstract document database.
///
/// None of these operations are transactional with respect to each other;
/// only `batch` is all-or-nothing.
#[async_trait]
pub trait DocumentStore: Debug + Send + Sync {
    /// Read a document. Returns `None` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Replace a document, creating it if absent.
    async fn put(&self, collection: &str, id: &str, document: Document) -> Result<()>;

    /// Apply partial writes to an existing document.
    ///
    /// Returns `StoreError::NotFound` if the document does not exist.
    async fn update_fields(&self, collection: &str, id: &str, writes: &[FieldWrite])
        -> Result<()>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()>;

    /// List every document in a collection, ordered by id.
    ///
    /// # Warning
    ///
    /// Loads the whole collection into memory. Intended for bounded
    /// collections (shard directories) and administrative passes.
    async fn list_docs(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    /// Apply every operation or none of them.
    async fn batch(&self, ops: Vec<BatchOp>) -> Result<()>;

    /// Ceilings enforced by this backend.
    fn limits(&self) -> StoreLimits;
}

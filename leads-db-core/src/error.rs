//! Error types for leads-db-core

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by a document store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// Document (or collection) not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A write would exceed the per-document size ceiling
    #[error("Document {collection}/{id} is {size} bytes, exceeding the {limit} byte limit")]
    DocumentTooLarge {
        collection: String,
        id: String,
        size: usize,
        limit: usize,
    },

    /// A batch carries more operations than the backend accepts
    #[error("Batch of {ops} operations exceeds the limit of {limit}")]
    BatchTooLarge { ops: usize, limit: usize },

    /// Collection name, document id or field path is not usable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A batch failed partway and could not be rolled back. Its journal is
    /// kept, so the batch is completed when the store is next opened.
    #[error("Batch incomplete, will be reapplied on next open: {0}")]
    BatchInDoubt(String),

    /// Transport or backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        StoreError::NotFound(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        StoreError::InvalidPath(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        StoreError::Storage(msg.into())
    }

    /// Create a batch-in-doubt error
    pub fn batch_in_doubt(msg: impl Into<String>) -> Self {
        StoreError::BatchInDoubt(msg.into())
    }

    /// Whether a failed batch may still take effect
    pub fn is_in_doubt(&self) -> bool {
        matches!(self, StoreError::BatchInDoubt(_))
    }

    /// Whether this error reports a size ceiling violation
    pub fn is_too_large(&self) -> bool {
        matches!(self, StoreError::DocumentTooLarge { .. })
    }
}

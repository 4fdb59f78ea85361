//! Document store abstraction for the sharded lead store
//!
//! This crate defines the small operation set the shard layer consumes from
//! the underlying document database:
//!
//! - [`DocumentStore`]: `get`, `put`, `update_fields`, `delete_doc`,
//!   `list_docs`, and the atomic `batch`
//! - [`StoreLimits`]: per-document byte ceiling and per-batch operation ceiling
//!
//! # Implementations
//!
//! - [`MemoryDocumentStore`]: in-memory implementation with failure injection
//! - [`FileDocumentStore`]: JSON-file implementation with a batch journal

pub mod document;
mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use document::{apply_field_writes, document_size, Document, FieldPath, FieldWrite};
pub use error::{Result, StoreError};
pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;
pub use store::{
    BatchOp, DocumentStore, StoreLimits, StoreOp, DEFAULT_MAX_BATCH_OPS,
    DEFAULT_MAX_DOCUMENT_BYTES,
};

//! Error types for leads-db-shard

use leads_db_core::StoreError;
use thiserror::Error;

/// Result type alias using ShardError
pub type Result<T> = std::result::Result<T, ShardError>;

/// Errors surfaced by the sharded lead store
#[derive(Error, Debug)]
pub enum ShardError {
    /// A mandatory field is missing or blank
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record or shard not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A write would exceed the store's per-document size ceiling
    #[error("Shard {collection}/{shard_id} is over capacity: {detail}")]
    CapacityExceeded {
        collection: String,
        shard_id: String,
        detail: String,
    },

    /// Both simple conversion and split migration failed
    #[error("Migration of shard {shard_id} failed: {reason}")]
    Migration { shard_id: String, reason: String },

    /// Cutover verification found a record count mismatch
    #[error("Cutover verification failed: expected {expected} records, found {actual}")]
    Consistency { expected: usize, actual: usize },

    /// A shard payload is neither list- nor dictionary-encoded
    #[error("Invalid shard {shard_id}: {reason}")]
    InvalidShard { shard_id: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Underlying store failure, passed through
    #[error(transparent)]
    Store(StoreError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for ShardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DocumentTooLarge {
                collection,
                id,
                size,
                limit,
            } => ShardError::CapacityExceeded {
                collection,
                shard_id: id,
                detail: format!("{size} bytes exceeds the {limit} byte document limit"),
            },
            other => ShardError::Store(other),
        }
    }
}

impl ShardError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        ShardError::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        ShardError::NotFound(msg.into())
    }

    /// Create a migration error
    pub fn migration(shard_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ShardError::Migration {
            shard_id: shard_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid shard error
    pub fn invalid_shard(shard_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ShardError::InvalidShard {
            shard_id: shard_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ShardError::Config(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ShardError::NotFound(_))
    }

    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, ShardError::CapacityExceeded { .. })
    }

    /// A migration that failed cleanly, leaving the shard as it was
    pub fn is_migration_failure(&self) -> bool {
        matches!(self, ShardError::Migration { .. })
    }
}

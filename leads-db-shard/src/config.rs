//! Configuration for the sharded lead store
//!
//! Every size here is derived from the store's per-document and per-batch
//! ceilings, so they are configuration rather than constants. The defaults
//! match a 1 MiB document limit and a 500-operation batch limit.

use crate::codec::Encoding;
use crate::error::{Result, ShardError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLLECTION: &str = "b2b_leads_sharded";
pub const DEFAULT_LEGACY_COLLECTION: &str = "b2b_leads";
pub const DEFAULT_SHARD_PREFIX: &str = "shard_";
pub const DEFAULT_INDEX_WIDTH: usize = 3;
pub const DEFAULT_CAPACITY: usize = 2500;
pub const DEFAULT_SPLIT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_DELETE_BATCH_SIZE: usize = 500;

/// Sharding configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Collection holding the shard documents
    pub collection: String,
    /// Unsharded collection read by the cutover, one document per lead
    pub legacy_collection: String,
    /// Shard id prefix (`shard_` gives `shard_000`, `shard_001`, ...)
    pub shard_prefix: String,
    /// Zero-padding width of the numeric shard suffix
    pub index_width: usize,
    /// Maximum leads per shard under normal conditions
    pub capacity: usize,
    /// Leads per shard produced by split migration; kept below `capacity`
    /// because the dictionary form of a lead is bulkier than its list form
    pub split_chunk_size: usize,
    /// Legacy documents deleted per batch once the cutover is verified
    pub delete_batch_size: usize,
    /// Encoding of the shards written by the cutover
    pub cutover_encoding: Encoding,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            legacy_collection: DEFAULT_LEGACY_COLLECTION.to_string(),
            shard_prefix: DEFAULT_SHARD_PREFIX.to_string(),
            index_width: DEFAULT_INDEX_WIDTH,
            capacity: DEFAULT_CAPACITY,
            split_chunk_size: DEFAULT_SPLIT_CHUNK_SIZE,
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
            cutover_encoding: Encoding::List,
        }
    }
}

impl ShardConfig {
    /// Defaults with a different shard capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn legacy_collection(mut self, collection: impl Into<String>) -> Self {
        self.legacy_collection = collection.into();
        self
    }

    pub fn split_chunk_size(mut self, size: usize) -> Self {
        self.split_chunk_size = size;
        self
    }

    pub fn delete_batch_size(mut self, size: usize) -> Self {
        self.delete_batch_size = size;
        self
    }

    pub fn cutover_encoding(mut self, encoding: Encoding) -> Self {
        self.cutover_encoding = encoding;
        self
    }

    /// Reject configurations the store cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.collection.is_empty() || self.legacy_collection.is_empty() {
            return Err(ShardError::config("collection names must not be empty"));
        }
        if self.collection == self.legacy_collection {
            return Err(ShardError::config(
                "sharded and legacy collections must differ",
            ));
        }
        if self.shard_prefix.is_empty() {
            return Err(ShardError::config("shard_prefix must not be empty"));
        }
        if self.shard_prefix.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(ShardError::config(
                "shard_prefix must not end with a digit",
            ));
        }
        for (name, value) in [
            ("index_width", self.index_width),
            ("capacity", self.capacity),
            ("split_chunk_size", self.split_chunk_size),
            ("delete_batch_size", self.delete_batch_size),
        ] {
            if value == 0 {
                return Err(ShardError::config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ShardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.capacity, 2500);
        assert_eq!(config.split_chunk_size, 800);
        assert_eq!(config.delete_batch_size, 500);
        assert_eq!(config.cutover_encoding, Encoding::List);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(ShardConfig::with_capacity(0).validate().is_err());
        assert!(ShardConfig::default()
            .split_chunk_size(0)
            .validate()
            .is_err());
        assert!(ShardConfig::default()
            .delete_batch_size(0)
            .validate()
            .is_err());
    }

    #[test]
    fn same_collection_twice_is_rejected() {
        let config = ShardConfig::default()
            .collection("leads")
            .legacy_collection("leads");
        assert!(matches!(config.validate(), Err(ShardError::Config(_))));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: ShardConfig = toml::from_str(
            r#"
            capacity = 1000
            cutover_encoding = "dictionary"
            "#,
        )
        .unwrap();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.cutover_encoding, Encoding::Dictionary);
        assert_eq!(config.shard_prefix, "shard_");
    }
}

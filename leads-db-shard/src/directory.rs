//! Shard directory
//!
//! Shards are documents named `{prefix}{index}` with a zero-padded numeric
//! suffix (`shard_000`, `shard_001`, ...). Ordering, not contiguity, is the
//! invariant: split migration retires an index and appends new ones, leaving
//! gaps. Shards are ordered by numeric index, which coincides with
//! lexicographic order while indexes fit the padding width and stays correct
//! once they outgrow it.

use crate::codec::ShardPayload;
use crate::config::ShardConfig;
use crate::error::Result;
use leads_db_core::DocumentStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Identifier of a shard document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ShardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A decoded shard document.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    pub id: ShardId,
    pub index: u64,
    pub payload: ShardPayload,
}

/// Naming and enumeration of shard documents within a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDirectory {
    collection: String,
    prefix: String,
    width: usize,
}

impl ShardDirectory {
    pub fn new(collection: impl Into<String>, prefix: impl Into<String>, width: usize) -> Self {
        Self {
            collection: collection.into(),
            prefix: prefix.into(),
            width,
        }
    }

    pub fn from_config(config: &ShardConfig) -> Self {
        Self::new(
            config.collection.clone(),
            config.shard_prefix.clone(),
            config.index_width,
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Shard id for a numeric index, e.g. `7 -> shard_007`.
    pub fn shard_id(&self, index: u64) -> ShardId {
        ShardId(format!("{}{:0width$}", self.prefix, index, width = self.width))
    }

    /// Numeric index of a shard id, or `None` for documents that are not
    /// shards of this directory.
    pub fn parse_index(&self, id: &str) -> Option<u64> {
        let digits = id.strip_prefix(&self.prefix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Read and decode every shard, ordered by index.
    pub async fn scan<S>(&self, store: &S) -> Result<Vec<Shard>>
    where
        S: DocumentStore + ?Sized,
    {
        let docs = store.list_docs(&self.collection).await?;
        let mut shards = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            let Some(index) = self.parse_index(&id) else {
                debug!(collection = %self.collection, doc_id = %id, "Skipping non-shard document");
                continue;
            };
            let id = ShardId(id);
            let payload = ShardPayload::decode(&id, &doc)?;
            shards.push(Shard { id, index, payload });
        }
        shards.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        Ok(shards)
    }

    /// Read and decode a single shard.
    pub async fn load<S>(&self, store: &S, id: &ShardId) -> Result<Option<Shard>>
    where
        S: DocumentStore + ?Sized,
    {
        let Some(index) = self.parse_index(id.as_str()) else {
            return Ok(None);
        };
        let Some(doc) = store.get(&self.collection, id.as_str()).await? else {
            return Ok(None);
        };
        Ok(Some(Shard {
            id: id.clone(),
            index,
            payload: ShardPayload::decode(id, &doc)?,
        }))
    }

    /// Index following the highest existing one (`0` for an empty directory).
    pub fn next_index(shards: &[Shard]) -> u64 {
        shards.iter().map(|s| s.index + 1).max().unwrap_or(0)
    }

    /// `count` fresh ids after the highest existing index.
    pub fn next_ids(&self, shards: &[Shard], count: usize) -> Vec<ShardId> {
        let start = Self::next_index(shards);
        (start..start + count as u64).map(|i| self.shard_id(i)).collect()
    }
}

/// The highest-index shard, if any.
pub fn last_shard(shards: &[Shard]) -> Option<&Shard> {
    shards.iter().max_by_key(|s| s.index)
}

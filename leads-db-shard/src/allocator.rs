//! Shard allocation
//!
//! Picks the shard a new lead goes to: the last shard while it has room,
//! otherwise the next sequential id. Selection is a pure read; the shard
//! document is created by the write that follows.
//!
//! Capacity is checked, not reserved. Two writers selecting concurrently can
//! both see room in the same shard and push it slightly past capacity.

use crate::codec::Encoding;
use crate::directory::{last_shard, Shard, ShardDirectory, ShardId};
use crate::error::Result;
use leads_db_core::DocumentStore;

/// Where the next write should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub shard_id: ShardId,
    /// Encoding of the existing shard; always `Dictionary` for a new one
    pub encoding: Encoding,
    pub current_size: usize,
    /// The shard document does not exist yet
    pub is_new: bool,
}

impl WriteTarget {
    fn fresh(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            encoding: Encoding::Dictionary,
            current_size: 0,
            is_new: true,
        }
    }

    /// Free slots under `capacity`.
    pub fn remaining(&self, capacity: usize) -> usize {
        capacity.saturating_sub(self.current_size)
    }
}

/// Chooses write targets for a shard directory.
#[derive(Debug, Clone)]
pub struct ShardAllocator {
    directory: ShardDirectory,
    capacity: usize,
}

impl ShardAllocator {
    pub fn new(directory: ShardDirectory, capacity: usize) -> Self {
        Self {
            directory,
            capacity,
        }
    }

    /// Scan the directory and select a target.
    pub async fn select_write_target<S>(&self, store: &S) -> Result<WriteTarget>
    where
        S: DocumentStore + ?Sized,
    {
        let shards = self.directory.scan(store).await?;
        Ok(self.select_from(&shards))
    }

    /// Select a target from an already scanned directory.
    pub fn select_from(&self, shards: &[Shard]) -> WriteTarget {
        match last_shard(shards) {
            None => WriteTarget::fresh(self.directory.shard_id(0)),
            Some(last) if last.payload.len() < self.capacity => WriteTarget {
                shard_id: last.id.clone(),
                encoding: last.payload.encoding(),
                current_size: last.payload.len(),
                is_new: false,
            },
            Some(last) => WriteTarget::fresh(self.directory.shard_id(last.index + 1)),
        }
    }
}

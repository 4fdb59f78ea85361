//! Caller-side lead → shard index
//!
//! Built from a `get_all` result and passed back as hints to `update` and
//! `delete`. The repository never owns one: a hint is only a guess, and a
//! stale one costs a full scan, never a wrong write.

use crate::directory::ShardId;
use crate::record::ShardedLead;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ShardIndex {
    entries: HashMap<String, ShardId>,
}

impl ShardIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leads<'a>(leads: impl IntoIterator<Item = &'a ShardedLead>) -> Self {
        let mut index = Self::new();
        for lead in leads {
            index.record(lead.lead.id.clone(), lead.shard_id.clone());
        }
        index
    }

    /// Shard the lead was last seen in.
    pub fn hint(&self, lead_id: &str) -> Option<&ShardId> {
        self.entries.get(lead_id)
    }

    pub fn record(&mut self, lead_id: impl Into<String>, shard_id: ShardId) {
        self.entries.insert(lead_id.into(), shard_id);
    }

    pub fn forget(&mut self, lead_id: &str) -> Option<ShardId> {
        self.entries.remove(lead_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Lead;

    #[test]
    fn builds_from_listing() {
        let listing = vec![
            ShardedLead {
                lead: Lead::new("a", "1"),
                shard_id: ShardId::new("shard_000"),
            },
            ShardedLead {
                lead: Lead::new("b", "2"),
                shard_id: ShardId::new("shard_001"),
            },
        ];
        let mut index = ShardIndex::from_leads(&listing);
        assert_eq!(index.len(), 2);
        assert_eq!(index.hint("b").map(ShardId::as_str), Some("shard_001"));

        index.forget("b");
        assert!(index.hint("b").is_none());
        assert!(!index.is_empty());
    }
}

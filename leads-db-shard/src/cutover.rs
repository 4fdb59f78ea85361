//! Legacy cutover
//!
//! One-time move of the flat legacy collection (one document per lead) into
//! the sharded layout:
//!
//! 1. read every legacy document
//! 2. write them in chunks of `capacity` to new shards after the current last
//!    index, encoded with `cutover_encoding`
//! 3. re-read the new shards and compare the record count with the legacy count
//! 4. only on a match, delete the legacy documents in bounded batches
//!
//! A count mismatch stops before any deletion with `ShardError::Consistency`,
//! leaving both representations in place. A verified cutover whose deletion
//! fails part way can be rerun only after removing the shards it wrote.

use crate::codec::ShardPayload;
use crate::config::ShardConfig;
use crate::directory::{ShardDirectory, ShardId};
use crate::error::{Result, ShardError};
use crate::record::Lead;
use leads_db_core::{BatchOp, DocumentStore};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{error, info, warn};

/// Where a cutover run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoverState {
    /// Nothing was written
    NotMigrated,
    /// Shards written and counts match; legacy data still present
    MigratedVerified,
    /// Shards written but counts differ; manual intervention required
    MigratedUnverified,
    /// Legacy documents removed
    LegacyDeleted,
}

impl fmt::Display for CutoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CutoverState::NotMigrated => "not migrated",
            CutoverState::MigratedVerified => "migrated, verified",
            CutoverState::MigratedUnverified => "migrated, unverified",
            CutoverState::LegacyDeleted => "legacy deleted",
        };
        f.write_str(s)
    }
}

/// Summary of a completed cutover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutoverReport {
    pub legacy_count: usize,
    pub shards_written: Vec<ShardId>,
    pub verified_count: usize,
    pub deleted: usize,
    pub state: CutoverState,
}

impl CutoverReport {
    fn nothing_to_migrate() -> Self {
        Self {
            legacy_count: 0,
            shards_written: Vec::new(),
            verified_count: 0,
            deleted: 0,
            state: CutoverState::NotMigrated,
        }
    }
}

#[derive(Debug)]
pub struct Cutover<'a, S: ?Sized> {
    store: &'a S,
    config: &'a ShardConfig,
    directory: &'a ShardDirectory,
}

impl<'a, S> Cutover<'a, S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: &'a S, config: &'a ShardConfig, directory: &'a ShardDirectory) -> Self {
        Self {
            store,
            config,
            directory,
        }
    }

    pub async fn run(&self) -> Result<CutoverReport> {
        let legacy_collection = self.config.legacy_collection.as_str();
        let legacy = self.store.list_docs(legacy_collection).await?;
        if legacy.is_empty() {
            info!(legacy_collection = %legacy_collection, "Legacy collection is empty; nothing to migrate");
            return Ok(CutoverReport::nothing_to_migrate());
        }

        let mut doc_ids = Vec::with_capacity(legacy.len());
        let mut leads = Vec::with_capacity(legacy.len());
        for (doc_id, doc) in legacy {
            leads.push(legacy_lead(&doc_id, doc)?);
            doc_ids.push(doc_id);
        }
        let legacy_count = leads.len();
        info!(
            legacy_collection = %legacy_collection,
            records = legacy_count,
            "Starting cutover"
        );

        let existing = self.directory.scan(self.store).await?;
        let chunks: Vec<Vec<Lead>> = leads
            .chunks(self.config.capacity)
            .map(<[_]>::to_vec)
            .collect();
        let shard_ids = self.directory.next_ids(&existing, chunks.len());

        for (shard_id, chunk) in shard_ids.iter().zip(chunks) {
            let records = chunk.len();
            let doc = ShardPayload::from_leads(self.config.cutover_encoding, chunk).encode()?;
            self.store
                .put(self.directory.collection(), shard_id.as_str(), doc)
                .await?;
            info!(shard_id = %shard_id, records, "Wrote cutover shard");
        }

        let verified_count = self.count_records(&shard_ids).await?;
        if verified_count != legacy_count {
            error!(
                expected = legacy_count,
                actual = verified_count,
                state = %CutoverState::MigratedUnverified,
                shards = ?shard_ids.iter().map(ShardId::as_str).collect::<Vec<_>>(),
                "Cutover verification failed; legacy collection kept"
            );
            return Err(ShardError::Consistency {
                expected: legacy_count,
                actual: verified_count,
            });
        }
        info!(
            records = verified_count,
            state = %CutoverState::MigratedVerified,
            "Cutover verified"
        );

        let deleted = self.delete_legacy(doc_ids).await?;
        info!(
            legacy_collection = %legacy_collection,
            deleted,
            state = %CutoverState::LegacyDeleted,
            "Cutover complete"
        );

        Ok(CutoverReport {
            legacy_count,
            shards_written: shard_ids,
            verified_count,
            deleted,
            state: CutoverState::LegacyDeleted,
        })
    }

    async fn count_records(&self, shard_ids: &[ShardId]) -> Result<usize> {
        let mut total = 0;
        for shard_id in shard_ids {
            match self.directory.load(self.store, shard_id).await? {
                Some(shard) => total += shard.payload.len(),
                None => warn!(shard_id = %shard_id, "Cutover shard missing on re-read"),
            }
        }
        Ok(total)
    }

    async fn delete_legacy(&self, doc_ids: Vec<String>) -> Result<usize> {
        let batch_size = self
            .config
            .delete_batch_size
            .min(self.store.limits().max_batch_ops)
            .max(1);
        let legacy_collection = self.config.legacy_collection.as_str();

        let mut deleted = 0;
        for ids in doc_ids.chunks(batch_size) {
            let ops = ids
                .iter()
                .map(|id| BatchOp::delete(legacy_collection, id.as_str()))
                .collect();
            if let Err(e) = self.store.batch(ops).await {
                error!(
                    deleted,
                    remaining = doc_ids.len() - deleted,
                    state = %CutoverState::MigratedVerified,
                    error = %e,
                    "Legacy deletion interrupted"
                );
                return Err(e.into());
            }
            deleted += ids.len();
        }
        Ok(deleted)
    }
}

/// Decode a legacy document; a missing `id` is taken from the document id.
fn legacy_lead(doc_id: &str, mut doc: leads_db_core::Document) -> Result<Lead> {
    let has_id = match doc.get("id") {
        Some(Value::String(id)) => !id.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    if !has_id {
        doc.insert("id".to_string(), Value::String(doc_id.to_string()));
    }
    Lead::from_value(Value::Object(doc)).map_err(|e| {
        ShardError::validation(format!("legacy document {doc_id} is not a lead: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leads_db_core::{Document, MemoryDocumentStore};
    use serde_json::json;

    fn legacy_doc(phone: &str) -> Document {
        match json!({"phone": phone, "status": "New"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn legacy_lead_takes_document_id() {
        let lead = legacy_lead("doc-1", legacy_doc("1")).unwrap();
        assert_eq!(lead.id, "doc-1");
        assert_eq!(lead.status.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn empty_legacy_collection_is_a_no_op() {
        let store = MemoryDocumentStore::new();
        let config = ShardConfig::with_capacity(3);
        let dir = ShardDirectory::from_config(&config);
        let report = Cutover::new(&store, &config, &dir).run().await.unwrap();
        assert_eq!(report.state, CutoverState::NotMigrated);
        assert_eq!(store.document_count(&config.collection), 0);
    }

    #[tokio::test]
    async fn deletes_in_bounded_batches() {
        let store = MemoryDocumentStore::new();
        let config = ShardConfig::with_capacity(4).delete_batch_size(2);
        let dir = ShardDirectory::from_config(&config);
        for i in 0..5 {
            store
                .put(&config.legacy_collection, &format!("l{i}"), legacy_doc("1"))
                .await
                .unwrap();
        }

        let report = Cutover::new(&store, &config, &dir).run().await.unwrap();
        assert_eq!(report.legacy_count, 5);
        assert_eq!(report.verified_count, 5);
        assert_eq!(report.deleted, 5);
        assert_eq!(report.shards_written.len(), 2);
        assert_eq!(report.state, CutoverState::LegacyDeleted);
        assert_eq!(store.document_count(&config.legacy_collection), 0);
    }
}

//! Shard encoding migration
//!
//! Converts a list-encoded shard to the dictionary encoding. The simple path
//! rewrites the shard in place. When that fails for any reason, the split path
//! partitions the shard's leads into chunks of `split_chunk_size`, writes each
//! chunk to a fresh dictionary shard after the current last index, and deletes
//! the original, all in one atomic batch. A failed batch leaves the original
//! shard untouched.
//!
//! Split changes the shard a lead lives in. Callers that migrated on behalf of
//! a pending update or delete must locate the lead again.

use crate::codec::{Encoding, ShardPayload};
use crate::config::ShardConfig;
use crate::directory::{Shard, ShardDirectory, ShardId};
use crate::error::{Result, ShardError};
use leads_db_core::{BatchOp, DocumentStore};
use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

/// What `migrate_shard` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// The shard was already dictionary-encoded; nothing was written
    AlreadyDictionary,
    /// Rewritten in place under the same id
    Converted,
    /// Replaced by `created`; `retired` no longer exists
    Split {
        retired: ShardId,
        created: Vec<ShardId>,
    },
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationOutcome::AlreadyDictionary => f.write_str("already dictionary"),
            MigrationOutcome::Converted => f.write_str("converted in place"),
            MigrationOutcome::Split { retired, created } => {
                let created: Vec<&str> = created.iter().map(ShardId::as_str).collect();
                write!(f, "split {retired} into {}", created.join(", "))
            }
        }
    }
}

/// Summary of a `migrate_all_shards` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Shards inspected, in directory order
    pub examined: usize,
    pub already_dictionary: Vec<ShardId>,
    pub converted: Vec<ShardId>,
    /// `(retired, created)` pairs
    pub split: Vec<(ShardId, Vec<ShardId>)>,
    /// Shards left list-encoded, with the reason
    pub failed: Vec<(ShardId, String)>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, shard_id: ShardId, outcome: MigrationOutcome) {
        match outcome {
            MigrationOutcome::AlreadyDictionary => self.already_dictionary.push(shard_id),
            MigrationOutcome::Converted => self.converted.push(shard_id),
            MigrationOutcome::Split { retired, created } => self.split.push((retired, created)),
        }
    }
}

/// Migrates shards of one directory.
#[derive(Debug)]
pub struct Migrator<'a, S: ?Sized> {
    store: &'a S,
    config: &'a ShardConfig,
    directory: &'a ShardDirectory,
}

impl<'a, S> Migrator<'a, S>
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

    /// Migrate one shard to the dictionary encoding.
    ///
    /// Idempotent: a dictionary shard is left alone. Fails with `NotFound` for
    /// an unknown shard and `Migration` when both paths fail. A split batch
    /// whose outcome is unknown surfaces as the store's `BatchInDoubt`.
    pub async fn migrate_shard(&self, shard_id: &ShardId) -> Result<MigrationOutcome> {
        let shard = self
            .directory
            .load(self.store, shard_id)
            .await?
            .ok_or_else(|| ShardError::not_found(format!("shard {shard_id}")))?;

        if shard.payload.encoding() == Encoding::Dictionary {
            return Ok(MigrationOutcome::AlreadyDictionary);
        }

        let dictionary = shard.payload.to_dictionary();
        let doc = dictionary.encode()?;
        match self
            .store
            .put(self.directory.collection(), shard_id.as_str(), doc)
            .await
        {
            Ok(()) => {
                info!(
                    collection = %self.directory.collection(),
                    shard_id = %shard_id,
                    records = dictionary.len(),
                    "Converted shard to dictionary encoding"
                );
                Ok(MigrationOutcome::Converted)
            }
            Err(e) => {
                warn!(
                    collection = %self.directory.collection(),
                    shard_id = %shard_id,
                    records = dictionary.len(),
                    error = %e,
                    "Simple conversion failed; attempting split"
                );
                self.split(&shard, dictionary, &e.to_string()).await
            }
        }
    }

    async fn split(
        &self,
        shard: &Shard,
        dictionary: ShardPayload,
        conversion_error: &str,
    ) -> Result<MigrationOutcome> {
        let fail = |reason: String| {
            error!(
                collection = %self.directory.collection(),
                shard_id = %shard.id,
                reason = %reason,
                "Split migration failed"
            );
            ShardError::migration(
                shard.id.as_str(),
                format!("conversion failed ({conversion_error}); {reason}"),
            )
        };

        let leads = dictionary.into_leads();
        if leads.is_empty() {
            return Err(fail("shard is empty, nothing to split".to_string()));
        }

        let chunk_size = self.config.split_chunk_size;
        let chunks: Vec<_> = leads.chunks(chunk_size).map(<[_]>::to_vec).collect();
        let max_ops = self.store.limits().max_batch_ops;
        if chunks.len() + 1 > max_ops {
            return Err(fail(format!(
                "{} chunks plus the retirement exceed the {max_ops} operation batch limit",
                chunks.len()
            )));
        }

        let existing = match self.directory.scan(self.store).await {
            Ok(shards) => shards,
            Err(e) => return Err(fail(format!("cannot scan directory: {e}"))),
        };
        let created = self.directory.next_ids(&existing, chunks.len());

        let collection = self.directory.collection();
        let mut ops = Vec::with_capacity(chunks.len() + 1);
        for (id, chunk) in created.iter().zip(chunks) {
            let doc = ShardPayload::from_leads(Encoding::Dictionary, chunk).encode()?;
            ops.push(BatchOp::put(collection, id.as_str(), doc));
        }
        ops.push(BatchOp::delete(collection, shard.id.as_str()));

        match self.store.batch(ops).await {
            Ok(()) => {}
            Err(e) if e.is_in_doubt() => {
                error!(
                    collection = %collection,
                    shard_id = %shard.id,
                    error = %e,
                    "Split batch outcome unknown"
                );
                return Err(e.into());
            }
            Err(e) => return Err(fail(format!("split batch failed: {e}"))),
        }

        info!(
            collection = %collection,
            retired = %shard.id,
            created = ?created.iter().map(ShardId::as_str).collect::<Vec<_>>(),
            records = shard.payload.len(),
            "Split shard into dictionary shards"
        );
        Ok(MigrationOutcome::Split {
            retired: shard.id.clone(),
            created,
        })
    }

    /// Migrate every list-encoded shard in a snapshot of the directory.
    ///
    /// Failures are recorded and the walk continues.
    pub async fn migrate_all_shards(&self) -> Result<MigrationReport> {
        let shards = self.directory.scan(self.store).await?;
        let mut report = MigrationReport {
            examined: shards.len(),
            ..MigrationReport::default()
        };

        for shard in shards {
            if shard.payload.encoding() == Encoding::Dictionary {
                report.already_dictionary.push(shard.id);
                continue;
            }
            match self.migrate_shard(&shard.id).await {
                Ok(outcome) => report.record(shard.id, outcome),
                Err(e) => {
                    warn!(shard_id = %shard.id, error = %e, "Shard left list-encoded");
                    report.failed.push((shard.id, e.to_string()));
                }
            }
        }

        info!(
            collection = %self.directory.collection(),
            examined = report.examined,
            converted = report.converted.len(),
            split = report.split.len(),
            failed = report.failed.len(),
            "Shard migration finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Lead;
    use leads_db_core::{MemoryDocumentStore, StoreLimits, StoreOp};

    fn setup() -> (MemoryDocumentStore, ShardConfig, ShardDirectory) {
        let config = ShardConfig::with_capacity(3).collection("leads");
        let directory = ShardDirectory::from_config(&config);
        (MemoryDocumentStore::new(), config, directory)
    }

    async fn seed_list(store: &MemoryDocumentStore, dir: &ShardDirectory, index: u64, ids: &[&str]) {
        let leads = ids.iter().map(|id| Lead::new(*id, "1")).collect();
        let doc = ShardPayload::from_leads(Encoding::List, leads).encode().unwrap();
        store
            .put(dir.collection(), dir.shard_id(index).as_str(), doc)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn converts_in_place() {
        let (store, config, dir) = setup();
        seed_list(&store, &dir, 0, &["x", "y", "z"]).await;
        let migrator = Migrator::new(&store, &config, &dir);

        let outcome = migrator.migrate_shard(&dir.shard_id(0)).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Converted);

        let again = migrator.migrate_shard(&dir.shard_id(0)).await.unwrap();
        assert_eq!(again, MigrationOutcome::AlreadyDictionary);
    }

    #[tokio::test]
    async fn unknown_shard_is_not_found() {
        let (store, config, dir) = setup();
        let err = Migrator::new(&store, &config, &dir)
            .migrate_shard(&ShardId::new("shard_009"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn failed_put_falls_back_to_split() {
        let (store, config, dir) = setup();
        let config = config.split_chunk_size(2);
        seed_list(&store, &dir, 0, &["a", "b", "c"]).await;
        store.fail_next(StoreOp::Put);

        let outcome = Migrator::new(&store, &config, &dir)
            .migrate_shard(&dir.shard_id(0))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Split {
                retired: dir.shard_id(0),
                created: vec![dir.shard_id(1), dir.shard_id(2)],
            }
        );
        assert!(store.get("leads", "shard_000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn split_respects_batch_limit() {
        let (store, config, dir) = setup();
        let config = config.split_chunk_size(1);
        store.set_limits(StoreLimits {
            max_batch_ops: 3,
            ..StoreLimits::default()
        });
        seed_list(&store, &dir, 0, &["a", "b", "c"]).await;
        store.fail_next(StoreOp::Put);

        let err = Migrator::new(&store, &config, &dir)
            .migrate_shard(&dir.shard_id(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ShardError::Migration { .. }));
        assert!(store.get("leads", "shard_000").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn report_counts_every_shard() {
        let (store, config, dir) = setup();
        seed_list(&store, &dir, 0, &["a"]).await;
        seed_list(&store, &dir, 1, &["b"]).await;
        let dict = ShardPayload::from_leads(Encoding::Dictionary, vec![Lead::new("c", "1")]);
        store
            .put("leads", "shard_002", dict.encode().unwrap())
            .await
            .unwrap();
        store.fail_next(StoreOp::Put);
        store.fail_next(StoreOp::Batch);

        let report = Migrator::new(&store, &config, &dir)
            .migrate_all_shards()
            .await
            .unwrap();
        assert_eq!(report.examined, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, dir.shard_id(0));
        assert_eq!(report.converted, vec![dir.shard_id(1)]);
        assert_eq!(report.already_dictionary, vec![dir.shard_id(2)]);
        assert!(!report.is_clean());
    }
}

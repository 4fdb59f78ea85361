//! Lead repository
//!
//! The CRUD surface over the sharded collection. Reads decode every shard
//! once and work on [`ShardPayload`]; writes go back through the store either
//! as a keyed field write (dictionary shards) or as a full rewrite (list
//! shards, which do not support partial writes).
//!
//! # Concurrency
//!
//! Each read-modify-write of a shard runs under a permit from the configured
//! [`WriteStrategy`]. With the default [`OptimisticWrite`] two concurrent
//! writers to the same shard race and the later write wins, silently
//! discarding the earlier one. Capacity is read-then-decide, so concurrent
//! `add` or `import_batch` calls can push a shard slightly past capacity.
//! `add` does not check that a caller-supplied id is unused in other shards.

use crate::allocator::{ShardAllocator, WriteTarget};
use crate::codec::{item_path, Encoding, ShardPayload};
use crate::config::ShardConfig;
use crate::cutover::{Cutover, CutoverReport};
use crate::directory::{Shard, ShardDirectory, ShardId};
use crate::error::{Result, ShardError};
use crate::migration::{MigrationOutcome, MigrationReport, Migrator};
use crate::record::{now_timestamp, Lead, LeadInput, LeadPatch, ShardedLead};
use crate::strategy::{OptimisticWrite, WriteStrategy};
use leads_db_core::{DocumentStore, FieldWrite};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of `import_batch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Shards written, in write order
    pub shards: Vec<ShardId>,
}

/// Operator view of one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    pub shard_id: ShardId,
    pub encoding: Encoding,
    pub size: usize,
}

/// Sharded lead store over a [`DocumentStore`].
#[derive(Debug)]
pub struct LeadRepository<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    config: ShardConfig,
    directory: ShardDirectory,
    allocator: ShardAllocator,
    strategy: Arc<dyn WriteStrategy>,
}

impl<S: DocumentStore + ?Sized> Clone for LeadRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            directory: self.directory.clone(),
            allocator: self.allocator.clone(),
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl<S: DocumentStore + ?Sized> LeadRepository<S> {
    /// Create a repository with the optimistic write strategy.
    pub fn new(store: Arc<S>, config: ShardConfig) -> Result<Self> {
        config.validate()?;
        let directory = ShardDirectory::from_config(&config);
        let allocator = ShardAllocator::new(directory.clone(), config.capacity);
        Ok(Self {
            store,
            config,
            directory,
            allocator,
            strategy: Arc::new(OptimisticWrite),
        })
    }

    /// Replace the write strategy.
    pub fn with_strategy(mut self, strategy: Arc<dyn WriteStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ShardConfig {
        &self.config
    }

    pub fn directory(&self) -> &ShardDirectory {
        &self.directory
    }

    fn migrator(&self) -> Migrator<'_, S> {
        Migrator::new(&*self.store, &self.config, &self.directory)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Every lead in every shard, tagged with the shard it was read from.
    pub async fn get_all(&self) -> Result<Vec<ShardedLead>> {
        let shards = self.directory.scan(&*self.store).await?;
        let mut leads = Vec::with_capacity(shards.iter().map(|s| s.payload.len()).sum());
        for shard in shards {
            let shard_id = shard.id;
            leads.extend(shard.payload.into_leads().into_iter().map(|lead| ShardedLead {
                lead,
                shard_id: shard_id.clone(),
            }));
        }
        Ok(leads)
    }

    /// Id, encoding and size of every shard.
    pub async fn shard_summaries(&self) -> Result<Vec<ShardSummary>> {
        let shards = self.directory.scan(&*self.store).await?;
        Ok(shards
            .into_iter()
            .map(|shard| ShardSummary {
                encoding: shard.payload.encoding(),
                size: shard.payload.len(),
                shard_id: shard.id,
            })
            .collect())
    }

    /// Find the shard holding `id`, trying `hint` before a full scan.
    async fn find_owner(&self, id: &str, hint: Option<&ShardId>) -> Result<Shard> {
        if let Some(hint) = hint {
            match self.directory.load(&*self.store, hint).await? {
                Some(shard) if shard.payload.contains(id) => return Ok(shard),
                _ => warn!(lead_id = %id, shard_hint = %hint, "Stale shard hint; scanning"),
            }
        }
        let shards = self.directory.scan(&*self.store).await?;
        shards
            .into_iter()
            .find(|shard| shard.payload.contains(id))
            .ok_or_else(|| ShardError::not_found(format!("lead {id}")))
    }

    /// Re-read a shard that is expected to exist.
    async fn load_existing(&self, shard_id: &ShardId) -> Result<Shard> {
        self.directory
            .load(&*self.store, shard_id)
            .await?
            .ok_or_else(|| ShardError::not_found(format!("shard {shard_id}")))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Add a lead to the last shard, or to a new one when it is full.
    ///
    /// Assigns an id when none is given and stamps `createdAt`/`updatedAt`.
    pub async fn add(&self, input: LeadInput) -> Result<Lead> {
        let lead = input.into_lead(&now_timestamp())?;
        let target = self.allocator.select_write_target(&*self.store).await?;

        let shard_id = match self
            .write_leads(&target.shard_id, std::slice::from_ref(&lead))
            .await
        {
            Ok(()) => target.shard_id,
            Err(e) if e.is_capacity_exceeded() && !target.is_new => {
                warn!(
                    shard_id = %target.shard_id,
                    encoding = %target.encoding,
                    lead_id = %lead.id,
                    error = %e,
                    "Shard over the document size limit; making room"
                );
                let retry = self.make_room(&target).await?;
                self.write_leads(&retry, std::slice::from_ref(&lead)).await?;
                retry
            }
            Err(e) => return Err(e),
        };

        debug!(lead_id = %lead.id, shard_id = %shard_id, "Added lead");
        Ok(lead)
    }

    /// Bulk append, filling the last shard before allocating new ones.
    ///
    /// Every input is validated before anything is written, and two inputs
    /// with the same id are rejected, so `imported` counts stored leads.
    /// Not transactional across shards: a failure leaves the leads before it
    /// imported.
    pub async fn import_batch(&self, inputs: Vec<LeadInput>) -> Result<ImportReport> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (pos, input) in inputs.iter().enumerate() {
            input.validate().map_err(|e| match e {
                ShardError::Validation(msg) => {
                    ShardError::validation(format!("record {pos}: {msg}"))
                }
                other => other,
            })?;
            if let Some(id) = input.id.as_deref() {
                if let Some(first) = seen.insert(id, pos) {
                    return Err(ShardError::validation(format!(
                        "record {pos}: duplicate id {id} (also record {first})"
                    )));
                }
            }
        }

        let now = now_timestamp();
        let leads = inputs
            .into_iter()
            .map(|input| input.into_lead(&now))
            .collect::<Result<Vec<_>>>()?;

        let mut report = ImportReport::default();
        let mut offset = 0;
        while offset < leads.len() {
            let target = self.allocator.select_write_target(&*self.store).await?;
            let end = leads
                .len()
                .min(offset + target.remaining(self.config.capacity).max(1));
            let chunk = &leads[offset..end];

            let shard_id = match self.write_leads(&target.shard_id, chunk).await {
                Ok(()) => target.shard_id,
                Err(e) if e.is_capacity_exceeded() && !target.is_new => {
                    warn!(
                        shard_id = %target.shard_id,
                        records = chunk.len(),
                        error = %e,
                        "Import chunk over the document size limit; making room"
                    );
                    let retry = self.make_room(&target).await?;
                    self.write_leads(&retry, chunk).await?;
                    retry
                }
                Err(e) => {
                    warn!(imported = report.imported, error = %e, "Import stopped");
                    return Err(e);
                }
            };

            debug!(shard_id = %shard_id, records = chunk.len(), "Imported chunk");
            report.imported += chunk.len();
            if report.shards.last() != Some(&shard_id) {
                report.shards.push(shard_id);
            }
            offset = end;
        }

        info!(
            imported = report.imported,
            shards = report.shards.len(),
            "Import finished"
        );
        Ok(report)
    }

    /// Write new leads into a shard, creating it if needed.
    async fn write_leads(&self, shard_id: &ShardId, leads: &[Lead]) -> Result<()> {
        let collection = self.directory.collection();
        let _permit = self.strategy.acquire(collection, shard_id.as_str()).await;

        match self.directory.load(&*self.store, shard_id).await? {
            None => {
                let payload = ShardPayload::from_leads(Encoding::Dictionary, leads.to_vec());
                self.store
                    .put(collection, shard_id.as_str(), payload.encode()?)
                    .await?;
            }
            Some(Shard {
                payload: ShardPayload::Dictionary(_),
                ..
            }) => {
                let writes = leads
                    .iter()
                    .map(|lead| Ok(FieldWrite::set(item_path(&lead.id), lead.to_value()?)))
                    .collect::<Result<Vec<_>>>()?;
                self.store
                    .update_fields(collection, shard_id.as_str(), &writes)
                    .await?;
            }
            Some(Shard {
                payload: ShardPayload::List(mut existing),
                ..
            }) => {
                existing.extend_from_slice(leads);
                let payload = ShardPayload::List(existing);
                self.store
                    .put(collection, shard_id.as_str(), payload.encode()?)
                    .await?;
            }
        }
        Ok(())
    }

    /// Free space after a size-limit failure on `target`: a list shard is
    /// migrated and the allocator asked again, a dictionary shard spills into
    /// the next index. Returns the shard to retry against.
    async fn make_room(&self, target: &WriteTarget) -> Result<ShardId> {
        if target.encoding == Encoding::List {
            match self.migrator().migrate_shard(&target.shard_id).await {
                Ok(outcome) => {
                    info!(shard_id = %target.shard_id, outcome = %outcome, "Migrated full shard");
                    let next = self.allocator.select_write_target(&*self.store).await?;
                    return Ok(next.shard_id);
                }
                Err(e) if e.is_migration_failure() => {
                    warn!(shard_id = %target.shard_id, error = %e, "Migration failed; spilling");
                }
                Err(e) => return Err(e),
            }
        }
        let shards = self.directory.scan(&*self.store).await?;
        let next = self.directory.shard_id(ShardDirectory::next_index(&shards));
        debug!(from = %target.shard_id, to = %next, "Spilling into next shard");
        Ok(next)
    }

    /// Merge `patch` into lead `id` and return the updated lead.
    ///
    /// A list-encoded owner is migrated first and the lead located again; if
    /// migration fails the full list is rewritten instead.
    pub async fn update(
        &self,
        id: &str,
        patch: &LeadPatch,
        shard_hint: Option<&ShardId>,
    ) -> Result<Lead> {
        patch.validate()?;
        let now = now_timestamp();
        let mut hint = shard_hint.cloned();
        let mut migration_attempted = false;

        loop {
            let owner = self.find_owner(id, hint.as_ref()).await?;
            if owner.payload.encoding() == Encoding::List && !migration_attempted {
                migration_attempted = true;
                match self.migrator().migrate_shard(&owner.id).await {
                    Ok(MigrationOutcome::Split { .. }) => {
                        hint = None;
                        continue;
                    }
                    Ok(_) => {
                        hint = Some(owner.id);
                        continue;
                    }
                    Err(e) if e.is_migration_failure() => {
                        warn!(
                            lead_id = %id,
                            shard_id = %owner.id,
                            error = %e,
                            "Migration failed; rewriting list shard"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }

            let lead = self.patch_in_shard(&owner.id, id, patch, &now).await?;
            debug!(lead_id = %id, shard_id = %owner.id, "Updated lead");
            return Ok(lead);
        }
    }

    async fn patch_in_shard(
        &self,
        shard_id: &ShardId,
        id: &str,
        patch: &LeadPatch,
        now: &str,
    ) -> Result<Lead> {
        let collection = self.directory.collection();
        let _permit = self.strategy.acquire(collection, shard_id.as_str()).await;

        let shard = self.load_existing(shard_id).await?;
        let mut lead = shard
            .payload
            .locate(id)
            .cloned()
            .ok_or_else(|| ShardError::not_found(format!("lead {id}")))?;
        patch.apply(&mut lead, now);

        match shard.payload {
            ShardPayload::Dictionary(_) => {
                let write = FieldWrite::set(item_path(id), lead.to_value()?);
                self.store
                    .update_fields(collection, shard_id.as_str(), &[write])
                    .await?;
            }
            mut payload @ ShardPayload::List(_) => {
                payload.upsert(lead.clone());
                self.store
                    .put(collection, shard_id.as_str(), payload.encode()?)
                    .await?;
            }
        }
        Ok(lead)
    }

    /// Remove lead `id`. Fails with `NotFound` when no shard holds it.
    pub async fn delete(&self, id: &str, shard_hint: Option<&ShardId>) -> Result<()> {
        let owner = self.find_owner(id, shard_hint).await?;
        let collection = self.directory.collection();
        let _permit = self.strategy.acquire(collection, owner.id.as_str()).await;

        let shard = self.load_existing(&owner.id).await?;
        if !shard.payload.contains(id) {
            return Err(ShardError::not_found(format!("lead {id}")));
        }

        match shard.payload {
            ShardPayload::Dictionary(_) => {
                self.store
                    .update_fields(
                        collection,
                        shard.id.as_str(),
                        &[FieldWrite::delete(item_path(id))],
                    )
                    .await?;
            }
            mut payload @ ShardPayload::List(_) => {
                payload.remove(id);
                self.store
                    .put(collection, shard.id.as_str(), payload.encode()?)
                    .await?;
            }
        }

        debug!(lead_id = %id, shard_id = %shard.id, "Deleted lead");
        Ok(())
    }

    // ========================================================================
    // Operator entry points
    // ========================================================================

    /// Migrate one shard to the dictionary encoding.
    pub async fn migrate_shard(&self, shard_id: &ShardId) -> Result<MigrationOutcome> {
        self.migrator().migrate_shard(shard_id).await
    }

    /// Migrate every list-encoded shard.
    pub async fn migrate_all_shards(&self) -> Result<MigrationReport> {
        self.migrator().migrate_all_shards().await
    }

    /// Move the legacy collection into shards; see [`Cutover`].
    pub async fn migrate_all_records(&self) -> Result<CutoverReport> {
        Cutover::new(&*self.store, &self.config, &self.directory)
            .run()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SerializedWrite;
    use leads_db_core::MemoryDocumentStore;

    fn repo(capacity: usize) -> LeadRepository<MemoryDocumentStore> {
        LeadRepository::new(
            Arc::new(MemoryDocumentStore::new()),
            ShardConfig::with_capacity(capacity),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = LeadRepository::new(
            Arc::new(MemoryDocumentStore::new()),
            ShardConfig::with_capacity(0),
        )
        .unwrap_err();
        assert!(matches!(err, ShardError::Config(_)));
    }

    #[tokio::test]
    async fn add_then_get_all_tags_shard() {
        let repo = repo(2);
        for id in ["a", "b", "c"] {
            repo.add(LeadInput::new("1").with_id(id)).await.unwrap();
        }
        let all = repo.get_all().await.unwrap();
        let placed: Vec<(&str, &str)> = all
            .iter()
            .map(|l| (l.lead.id.as_str(), l.shard_id.as_str()))
            .collect();
        assert_eq!(
            placed,
            vec![("a", "shard_000"), ("b", "shard_000"), ("c", "shard_001")]
        );
    }

    #[tokio::test]
    async fn import_validates_before_writing() {
        let repo = repo(3);
        let err = repo
            .import_batch(vec![LeadInput::new("1"), LeadInput::default()])
            .await
            .unwrap_err();
        assert!(matches!(err, ShardError::Validation(ref msg) if msg.starts_with("record 1")));
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn serialized_strategy_handles_concurrent_adds() {
        let repo = repo(100).with_strategy(Arc::new(SerializedWrite::new()));
        let mut handles = Vec::new();
        for i in 0..10 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.add(LeadInput::new(format!("{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(repo.get_all().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn summaries_report_encoding_and_size() {
        let repo = repo(2);
        repo.import_batch(vec![LeadInput::new("1"); 3]).await.unwrap();
        let summaries = repo.shard_summaries().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].size, 2);
        assert_eq!(summaries[1].size, 1);
        assert!(summaries.iter().all(|s| s.encoding == Encoding::Dictionary));
    }
}

//! Shared helpers for leads-db-shard integration tests.

// Not every test crate uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use leads_db_core::{
    BatchOp, Document, DocumentStore, FieldWrite, MemoryDocumentStore, StoreLimits,
};
use leads_db_shard::{Encoding, Lead, LeadRepository, ShardConfig, ShardPayload};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type MemoryRepo = LeadRepository<MemoryDocumentStore>;

// =============================================================================
// Repositories
// =============================================================================

/// Memory-backed repository with the given shard capacity.
pub fn memory_repo(capacity: usize) -> (Arc<MemoryDocumentStore>, MemoryRepo) {
    memory_repo_with(ShardConfig::with_capacity(capacity))
}

pub fn memory_repo_with(config: ShardConfig) -> (Arc<MemoryDocumentStore>, MemoryRepo) {
    let store = Arc::new(MemoryDocumentStore::new());
    let repo = LeadRepository::new(Arc::clone(&store), config).expect("valid config");
    (store, repo)
}

// =============================================================================
// Data helpers
// =============================================================================

pub fn lead(id: &str, phone: &str) -> Lead {
    let mut lead = Lead::new(id, phone);
    lead.name = Some(format!("Lead {id}"));
    lead.business_name = Some(format!("{id} Traders"));
    lead.status = Some("New".to_string());
    lead
}

pub fn leads(prefix: &str, count: usize) -> Vec<Lead> {
    (0..count)
        .map(|i| lead(&format!("{prefix}{i:04}"), &format!("9000{i:06}")))
        .collect()
}

pub fn as_document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Write a shard document directly, bypassing the repository.
pub async fn seed_shard(
    store: &MemoryDocumentStore,
    config: &ShardConfig,
    shard_id: &str,
    encoding: Encoding,
    leads: Vec<Lead>,
) {
    let doc = ShardPayload::from_leads(encoding, leads)
        .encode()
        .expect("encode");
    store
        .put(&config.collection, shard_id, doc)
        .await
        .expect("seed shard");
}

/// Write legacy documents `{prefix}{n}` without an `id` field.
pub async fn seed_legacy(store: &dyn DocumentStore, config: &ShardConfig, count: usize) {
    for i in 0..count {
        let doc = as_document(json!({
            "phone": format!("8000{i:06}"),
            "name": format!("Legacy {i}"),
            "status": "Contacted",
        }));
        store
            .put(&config.legacy_collection, &format!("legacy-{i:03}"), doc)
            .await
            .expect("seed legacy");
    }
}

/// Raw `items` value of a stored shard.
pub async fn raw_items(store: &dyn DocumentStore, config: &ShardConfig, shard_id: &str) -> Value {
    let doc = store
        .get(&config.collection, shard_id)
        .await
        .expect("get")
        .unwrap_or_else(|| panic!("shard {shard_id} missing"));
    doc.get("items").cloned().unwrap_or(Value::Null)
}

/// Every stored lead, keyed by id.
pub async fn leads_by_id(repo: &MemoryRepo) -> BTreeMap<String, Lead> {
    repo.get_all()
        .await
        .expect("get_all")
        .into_iter()
        .map(|l| (l.lead.id.clone(), l.lead))
        .collect()
}

/// `(shard id, size)` for every shard, in directory order.
pub async fn shard_sizes(repo: &MemoryRepo) -> Vec<(String, usize)> {
    repo.shard_summaries()
        .await
        .expect("summaries")
        .into_iter()
        .map(|s| (s.shard_id.to_string(), s.size))
        .collect()
}

/// Byte size of a payload's stored form.
pub fn encoded_size(encoding: Encoding, leads: Vec<Lead>) -> usize {
    let doc = ShardPayload::from_leads(encoding, leads)
        .encode()
        .expect("encode");
    leads_db_core::document_size(&doc).expect("size")
}

pub fn tighten_document_limit(store: &MemoryDocumentStore, max_document_bytes: usize) {
    store.set_limits(StoreLimits {
        max_document_bytes,
        ..StoreLimits::default()
    });
}

// =============================================================================
// Stores
// =============================================================================

/// Store that acknowledges one `put` to a collection without writing it.
#[derive(Debug)]
pub struct LossyStore {
    inner: MemoryDocumentStore,
    drop_put_to: Mutex<Option<String>>,
}

impl LossyStore {
    pub fn new(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            drop_put_to: Mutex::new(None),
        }
    }

    pub fn drop_next_put(&self, collection: &str) {
        *self.drop_put_to.lock() = Some(collection.to_string());
    }

    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }
}

#[async_trait]
impl DocumentStore for LossyStore {
    async fn get(&self, collection: &str, id: &str) -> leads_db_core::Result<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn put(&self, collection: &str, id: &str, document: Document) -> leads_db_core::Result<()> {
        {
            let mut drop_put_to = self.drop_put_to.lock();
            if drop_put_to.as_deref() == Some(collection) {
                *drop_put_to = None;
                return Ok(());
            }
        }
        self.inner.put(collection, id, document).await
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        writes: &[FieldWrite],
    ) -> leads_db_core::Result<()> {
        self.inner.update_fields(collection, id, writes).await
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> leads_db_core::Result<()> {
        self.inner.delete_doc(collection, id).await
    }

    async fn list_docs(&self, collection: &str) -> leads_db_core::Result<Vec<(String, Document)>> {
        self.inner.list_docs(collection).await
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> leads_db_core::Result<()> {
        self.inner.batch(ops).await
    }

    fn limits(&self) -> StoreLimits {
        self.inner.limits()
    }
}

use crate::config;
use crate::error::CliResult;
use leads_db_core::FileDocumentStore;
use leads_db_shard::LeadRepository;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub type FileRepository = LeadRepository<FileDocumentStore>;

/// Open the lead repository stored under `store`.
pub async fn build_repository(store: &Path) -> CliResult<FileRepository> {
    let store_dir = config::require_store_dir(store)?;
    let config = config::load_config(&store_dir)?;
    let documents = FileDocumentStore::open(&store_dir)
        .await?
        .with_limits(config.store);
    debug!(
        store = %store_dir.display(),
        collection = %config.shards.collection,
        capacity = config.shards.capacity,
        "Opened lead store"
    );
    Ok(LeadRepository::new(Arc::new(documents), config.shards)?)
}

//! Lead store over the JSON file backend.

mod support;

use leads_db_core::{DocumentStore, FileDocumentStore, StoreLimits};
use leads_db_shard::{
    CutoverState, Encoding, LeadInput, LeadPatch, LeadRepository, MigrationOutcome, ShardConfig,
    ShardId, ShardPayload,
};
use std::sync::Arc;

async fn file_repo(path: &std::path::Path, capacity: usize) -> LeadRepository<FileDocumentStore> {
    let store = FileDocumentStore::open(path).await.expect("open store");
    LeadRepository::new(Arc::new(store), ShardConfig::with_capacity(capacity)).expect("repo")
}

#[tokio::test]
async fn leads_persist_across_reopen() {
    let tmp = tempfile::TempDir::new().expect("tempdir");

    {
        let repo = file_repo(tmp.path(), 2).await;
        for id in ["a", "b", "c"] {
            repo.add(LeadInput::new("1").with_id(id).name(format!("Lead {id}")))
                .await
                .expect("add");
        }
        repo.update("c", &LeadPatch::new().status("Contacted"), None)
            .await
            .expect("update");
        repo.delete("a", None).await.expect("delete");
    }

    let repo = file_repo(tmp.path(), 2).await;
    let all = repo.get_all().await.expect("get_all");
    let ids: Vec<(&str, &str)> = all
        .iter()
        .map(|l| (l.lead.id.as_str(), l.shard_id.as_str()))
        .collect();
    assert_eq!(ids, vec![("b", "shard_000"), ("c", "shard_001")]);
    assert_eq!(all[1].lead.status.as_deref(), Some("Contacted"));

    let shard_file = tmp
        .path()
        .join(&repo.config().collection)
        .join("shard_001.json");
    assert!(shard_file.exists());
}

#[tokio::test]
async fn cutover_and_split_on_disk() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let repo = file_repo(tmp.path(), 4).await;
    let config = repo.config().clone();

    support::seed_legacy(&**repo.store(), &config, 6).await;
    let report = repo.migrate_all_records().await.expect("cutover");
    assert_eq!(report.state, CutoverState::LegacyDeleted);
    assert_eq!(report.shards_written.len(), 2);

    let summaries = repo.shard_summaries().await.expect("summaries");
    assert!(summaries.iter().all(|s| s.encoding == Encoding::List));

    let outcome = repo
        .migrate_shard(&ShardId::new("shard_000"))
        .await
        .expect("migrate");
    assert_eq!(outcome, MigrationOutcome::Converted);

    let report = repo.migrate_all_shards().await.expect("migrate all");
    assert_eq!(report.converted, vec![ShardId::new("shard_001")]);
    assert_eq!(repo.get_all().await.expect("get_all").len(), 6);
}

#[tokio::test]
async fn failed_split_on_disk_keeps_fallback_update() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let config = ShardConfig::with_capacity(20).split_chunk_size(3);
    let seeded = support::leads("lead-with-a-rather-long-identifier-", 6);
    let list_size = support::encoded_size(Encoding::List, seeded.clone());
    let limits = StoreLimits {
        max_document_bytes: list_size + 120,
        ..StoreLimits::default()
    };

    {
        let store = FileDocumentStore::open(tmp.path())
            .await
            .expect("open store")
            .with_limits(limits);
        let doc = ShardPayload::from_leads(Encoding::List, seeded)
            .encode()
            .expect("encode");
        store
            .put(&config.collection, "shard_000", doc)
            .await
            .expect("seed shard");

        // The second split shard cannot be written
        let collection_dir = tmp.path().join(&config.collection);
        std::fs::create_dir(collection_dir.join("shard_002.json.tmp")).expect("block");

        let repo = LeadRepository::new(Arc::new(store), config.clone()).expect("repo");
        let target = "lead-with-a-rather-long-identifier-0004";
        repo.update(target, &LeadPatch::new().district("Pune"), None)
            .await
            .expect("list rewrite");

        assert!(!collection_dir.join("shard_001.json").exists());
        assert!(!tmp.path().join(".batch-journal.json").exists());
    }

    let store = FileDocumentStore::open(tmp.path())
        .await
        .expect("reopen")
        .with_limits(limits);
    let repo = LeadRepository::new(Arc::new(store), config).expect("repo");
    let all = repo.get_all().await.expect("get_all");
    assert_eq!(all.len(), 6);
    assert!(all.iter().all(|l| l.shard_id.as_str() == "shard_000"));
    let updated = all
        .iter()
        .find(|l| l.lead.id == "lead-with-a-rather-long-identifier-0004")
        .expect("listed");
    assert_eq!(updated.lead.district.as_deref(), Some("Pune"));
}

use crate::config;
use crate::error::CliResult;
use std::path::Path;

/// Default config.toml template with commented-out defaults.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Lead store configuration
#
# Uncomment and modify values as needed. Shard sizes are derived from the
# store limits below; lower them together.

# [shards]
# collection = "b2b_leads_sharded"
# legacy_collection = "b2b_leads"
# shard_prefix = "shard_"
# index_width = 3
# capacity = 2500                    # leads per shard
# split_chunk_size = 800             # leads per shard produced by a split
# delete_batch_size = 500            # legacy deletions per cutover batch
# cutover_encoding = "list"          # list, dictionary

# [store]
# max_document_bytes = 1048576       # 1 MiB
# max_batch_ops = 500
"#;

pub fn run(store: &Path) -> CliResult<()> {
    if config::init_store_dir(store, DEFAULT_CONFIG_TEMPLATE)? {
        println!("Initialized lead store in {}", store.display());
    } else {
        println!("Lead store already initialized in {}", store.display());
    }
    Ok(())
}

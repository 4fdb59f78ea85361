use crate::context;
use crate::error::CliResult;
use leads_db_shard::ShardId;
use std::path::Path;

pub async fn run(store: &Path, id: &str, shard: Option<String>) -> CliResult<()> {
    let repo = context::build_repository(store).await?;
    let hint = shard.map(ShardId::from);
    repo.delete(id, hint.as_ref()).await?;
    println!("Deleted lead {id}");
    Ok(())
}

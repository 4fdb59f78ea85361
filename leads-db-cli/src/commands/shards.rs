use crate::cli::OutputFormat;
use crate::context;
use crate::error::CliResult;
use crate::output;
use std::path::Path;

pub async fn run(store: &Path, format: OutputFormat) -> CliResult<()> {
    let repo = context::build_repository(store).await?;
    let shards = repo.shard_summaries().await?;

    match format {
        OutputFormat::Json => println!("{}", output::to_json(&shards)?),
        OutputFormat::Table if shards.is_empty() => println!("No shards yet."),
        OutputFormat::Table => println!("{}", output::shards_table(&shards)),
    }
    Ok(())
}

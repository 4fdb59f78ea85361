use crate::context;
use crate::error::{CliError, CliResult};
use leads_db_shard::LeadInput;
use std::path::Path;

pub async fn run(store: &Path, file: &Path) -> CliResult<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| CliError::Input(format!("cannot read {}: {e}", file.display())))?;
    let inputs: Vec<LeadInput> = serde_json::from_str(&content)?;
    if inputs.is_empty() {
        println!("Nothing to import");
        return Ok(());
    }

    let repo = context::build_repository(store).await?;
    let report = repo.import_batch(inputs).await?;
    let shards: Vec<String> = report.shards.iter().map(ToString::to_string).collect();
    println!(
        "Imported {} leads into {}",
        report.imported,
        shards.join(", ")
    );
    Ok(())
}

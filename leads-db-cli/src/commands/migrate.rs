use crate::context;
use crate::error::{CliError, CliResult};
use colored::Colorize;
use leads_db_shard::{MigrationReport, ShardId};
use std::path::Path;

pub async fn run_one(store: &Path, shard_id: &str) -> CliResult<()> {
    let repo = context::build_repository(store).await?;
    let outcome = repo.migrate_shard(&ShardId::from(shard_id)).await?;
    println!("{shard_id}: {outcome}");
    Ok(())
}

pub async fn run_all(store: &Path) -> CliResult<()> {
    let repo = context::build_repository(store).await?;
    let report = repo.migrate_all_shards().await?;
    print_report(&report);

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::Input(format!(
            "{} shard(s) could not be migrated",
            report.failed.len()
        )))
    }
}

fn print_report(report: &MigrationReport) {
    println!("Examined {} shard(s)", report.examined);
    println!("  already dictionary: {}", report.already_dictionary.len());
    for shard_id in &report.converted {
        println!("  {} {shard_id}", "converted".green());
    }
    for (retired, created) in &report.split {
        let created: Vec<String> = created.iter().map(ToString::to_string).collect();
        println!("  {} {retired} -> {}", "split".green(), created.join(", "));
    }
    for (shard_id, reason) in &report.failed {
        println!("  {} {shard_id}: {reason}", "failed".red());
    }
}

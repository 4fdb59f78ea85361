use crate::context;
use crate::error::{CliError, CliResult};
use leads_db_shard::CutoverState;
use std::path::Path;

pub async fn run(store: &Path, force: bool) -> CliResult<()> {
    if !force {
        return Err(CliError::Usage(
            "use --force to confirm the legacy collection may be deleted after verification"
                .to_string(),
        ));
    }

    let repo = context::build_repository(store).await?;
    let report = repo.migrate_all_records().await?;

    if report.state == CutoverState::NotMigrated {
        println!(
            "Legacy collection '{}' is empty; nothing to migrate",
            repo.config().legacy_collection
        );
        return Ok(());
    }

    let shards: Vec<String> = report.shards_written.iter().map(ToString::to_string).collect();
    println!(
        "Migrated {} legacy leads into {} ({})",
        report.legacy_count,
        shards.join(", "),
        report.state
    );
    println!(
        "Verified {} leads, deleted {} legacy documents",
        report.verified_count, report.deleted
    );
    Ok(())
}

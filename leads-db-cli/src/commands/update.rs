use crate::cli::LeadFields;
use crate::context;
use crate::error::{CliError, CliResult};
use crate::output;
use leads_db_shard::{LeadPatch, ShardId};
use std::path::Path;

pub async fn run(
    store: &Path,
    id: &str,
    shard: Option<String>,
    phone: Option<String>,
    fields: LeadFields,
) -> CliResult<()> {
    let patch = LeadPatch {
        phone,
        name: fields.name,
        business_name: fields.business_name,
        state: fields.state,
        district: fields.district,
        pincode: fields.pincode,
        status: fields.status,
        kam: fields.kam,
        ..LeadPatch::default()
    };
    if patch.is_empty() {
        return Err(CliError::Usage(
            "nothing to update; pass at least one field, e.g. --status Contacted".to_string(),
        ));
    }

    let repo = context::build_repository(store).await?;
    let hint = shard.map(ShardId::from);
    let lead = repo.update(id, &patch, hint.as_ref()).await?;
    println!("Updated lead {}", output::describe(&lead));
    Ok(())
}

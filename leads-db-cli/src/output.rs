use crate::error::CliResult;
use comfy_table::{ContentArrangement, Table};
use leads_db_shard::{Lead, ShardSummary, ShardedLead};
use serde::Serialize;

/// Pretty-printed JSON for `--format json`.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

pub fn leads_table(leads: &[ShardedLead]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "PHONE", "NAME", "BUSINESS", "STATUS", "KAM", "SHARD",
    ]);
    for sharded in leads {
        let lead = &sharded.lead;
        table.add_row(vec![
            lead.id.clone(),
            lead.phone.clone(),
            cell(&lead.name),
            cell(&lead.business_name),
            cell(&lead.status),
            cell(&lead.kam),
            sharded.shard_id.to_string(),
        ]);
    }
    table.to_string()
}

pub fn shards_table(shards: &[ShardSummary]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["SHARD", "ENCODING", "LEADS"]);
    for shard in shards {
        table.add_row(vec![
            shard.shard_id.to_string(),
            shard.encoding.to_string(),
            shard.size.to_string(),
        ]);
    }
    table.to_string()
}

/// One-line description of a lead.
pub fn describe(lead: &Lead) -> String {
    match &lead.name {
        Some(name) => format!("{} ({name}, {})", lead.id, lead.phone),
        None => format!("{} ({})", lead.id, lead.phone),
    }
}

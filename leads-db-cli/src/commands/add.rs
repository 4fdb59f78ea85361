use crate::cli::LeadFields;
use crate::context;
use crate::error::CliResult;
use crate::output;
use leads_db_shard::LeadInput;
use std::path::Path;

pub async fn run(store: &Path, phone: String, id: Option<String>, fields: LeadFields) -> CliResult<()> {
    let repo = context::build_repository(store).await?;
    let input = LeadInput {
        id,
        phone: Some(phone),
        name: fields.name,
        business_name: fields.business_name,
        state: fields.state,
        district: fields.district,
        pincode: fields.pincode,
        status: fields.status,
        kam: fields.kam,
        ..LeadInput::default()
    };
    let lead = repo.add(input).await?;
    println!("Added lead {}", output::describe(&lead));
    Ok(())
}

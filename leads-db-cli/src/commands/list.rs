use crate::cli::OutputFormat;
use crate::context;
use crate::error::CliResult;
use crate::output;
use std::path::Path;

pub async fn run(store: &Path, format: OutputFormat) -> CliResult<()> {
    let repo = context::build_repository(store).await?;
    let leads = repo.get_all().await?;

    match format {
        OutputFormat::Json => println!("{}", output::to_json(&leads)?),
        OutputFormat::Table if leads.is_empty() => {
            println!("No leads found. Run 'leads add --phone <PHONE>' to add one.");
        }
        OutputFormat::Table => println!("{}", output::leads_table(&leads)),
    }
    Ok(())
}

//! Lead store CLI library.
//!
//! Types and command handlers behind the `leads` binary, an operator
//! interface over a file-backed sharded lead store.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod output;

use cli::{Cli, Commands};

/// Dispatch a parsed [`Cli`] to the appropriate command handler.
pub async fn run(cli: Cli) -> error::CliResult<()> {
    let store = cli.store.as_path();

    match cli.command {
        Commands::Init => commands::init::run(store),

        Commands::List { format } => commands::list::run(store, format).await,

        Commands::Add { phone, id, fields } => {
            commands::add::run(store, phone, id, fields).await
        }

        Commands::Update {
            id,
            shard,
            phone,
            fields,
        } => commands::update::run(store, &id, shard, phone, fields).await,

        Commands::Delete { id, shard } => commands::delete::run(store, &id, shard).await,

        Commands::Import { file } => commands::import::run(store, &file).await,

        Commands::Shards { format } => commands::shards::run(store, format).await,

        Commands::MigrateShards => commands::migrate::run_all(store).await,

        Commands::MigrateShard { shard_id } => {
            commands::migrate::run_one(store, &shard_id).await
        }

        Commands::Cutover { force } => commands::cutover::run(store, force).await,
    }
}

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "leads", about = "Sharded B2B lead store CLI", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store directory
    #[arg(long, global = true, default_value = ".leads")]
    pub store: PathBuf,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a store directory with a default config.toml
    Init,

    /// List every lead with the shard it lives in
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Add a lead
    Add {
        /// Contact number (mandatory)
        #[arg(long)]
        phone: String,

        /// Lead id; generated when omitted
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        fields: LeadFields,
    },

    /// Update fields of an existing lead
    Update {
        /// Lead id
        id: String,

        /// Shard the lead was last seen in
        #[arg(long)]
        shard: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[command(flatten)]
        fields: LeadFields,
    },

    /// Delete a lead
    Delete {
        /// Lead id
        id: String,

        /// Shard the lead was last seen in
        #[arg(long)]
        shard: Option<String>,
    },

    /// Import leads from a JSON array file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Show shard ids, encodings and sizes
    Shards {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Convert every list-encoded shard to the dictionary encoding
    MigrateShards,

    /// Convert one shard to the dictionary encoding
    MigrateShard {
        /// Shard id, e.g. shard_003
        shard_id: String,
    },

    /// Move the legacy collection into shards and delete it once verified
    Cutover {
        /// Required flag to confirm the legacy collection may be deleted
        #[arg(long)]
        force: bool,
    },
}

/// Optional descriptive lead fields shared by `add` and `update`.
#[derive(Args, Debug, Clone, Default)]
pub struct LeadFields {
    #[arg(long)]
    pub name: Option<String>,

    /// Organization
    #[arg(long)]
    pub business_name: Option<String>,

    /// Region
    #[arg(long)]
    pub state: Option<String>,

    /// Sub-region
    #[arg(long)]
    pub district: Option<String>,

    /// Postal code
    #[arg(long)]
    pub pincode: Option<String>,

    /// New, Contacted, Converted or Lost
    #[arg(long)]
    pub status: Option<String>,

    /// Assigned key account manager
    #[arg(long)]
    pub kam: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

use colored::Colorize;
use leads_db_core::StoreError;
use leads_db_shard::ShardError;
use std::fmt;
use std::path::PathBuf;
use std::process;

/// Exit codes for the CLI.
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Unified error type for CLI operations.
pub enum CliError {
    /// Error from the lead store.
    Shard(ShardError),
    /// Configuration / init issues.
    Config(String),
    /// Bad file path, unreadable input, parse failure.
    Input(String),
    /// Lead or shard not found.
    NotFound(String),
    /// Store directory not found.
    NoStore(PathBuf),
    /// Argument / usage errors.
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Shard(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Config(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Input(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::NotFound(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::NoStore(path) => write!(
                f,
                "{} no store found at {}\n  {} run 'leads init' to initialize",
                "error:".red().bold(),
                path.display(),
                "help:".cyan().bold(),
            ),
            CliError::Usage(msg) => write!(f, "{} {msg}", "error:".red().bold()),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<ShardError> for CliError {
    fn from(e: ShardError) -> Self {
        match e {
            ShardError::NotFound(msg) => CliError::NotFound(format!("{msg} not found")),
            other => CliError::Shard(other),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::from(ShardError::from(e))
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Input(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Input(format!("JSON parse error: {e}"))
    }
}

impl From<toml::de::Error> for CliError {
    fn from(e: toml::de::Error) -> Self {
        CliError::Config(format!("invalid config.toml: {e}"))
    }
}

/// Print error and exit with the appropriate code.
pub fn exit_with_error(err: CliError) -> ! {
    eprintln!("{err}");
    let code = match &err {
        CliError::Usage(_) => EXIT_USAGE,
        _ => EXIT_ERROR,
    };
    process::exit(code)
}

pub type CliResult<T> = std::result::Result<T, CliError>;

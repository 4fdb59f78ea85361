use clap::Parser;
use leads_db_cli::cli::Cli;
use leads_db_cli::error::exit_with_error;
use tracing_subscriber::EnvFilter;

/// Crates whose events `--verbose` shows when `RUST_LOG` is unset.
const LOG_TARGETS: [&str; 3] = ["leads_db_core", "leads_db_shard", "leads_db_cli"];

/// Logging is off unless asked for; `--verbose` defers to `RUST_LOG`.
fn log_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet || !verbose {
        return EnvFilter::new("off");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = LOG_TARGETS
            .iter()
            .map(|target| format!("{target}=info"))
            .collect();
        EnvFilter::new(directives.join(","))
    })
}

fn color_enabled(cli: &Cli) -> bool {
    !cli.no_color && std::env::var_os("NO_COLOR").is_none()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let color = color_enabled(&cli);
    if !color {
        colored::control::set_override(false);
    }

    // Logs share stderr with error output, leaving stdout for results
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet))
        .with_ansi(color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = leads_db_cli::run(cli).await {
        exit_with_error(e);
    }
}


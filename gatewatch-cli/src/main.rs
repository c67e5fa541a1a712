//! Gatewatch CLI entry point
//!
//! Parses arguments, initialises logging (to stderr so command output on
//! stdout stays machine-readable), and dispatches to the command handlers.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.log_level.as_deref());

    let writer = OutputWriter::new(cli.output);
    let config_path = cli.config.clone();

    let result = run(cli, &config_path, &writer).await;

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, config_path: &std::path::Path, writer: &OutputWriter) -> Result<(), CliError> {
    match cli.command {
        Commands::Import(args) => commands::import::execute(args, config_path, writer).await,
        Commands::Watch(args) => commands::watch::execute(args, config_path, writer).await,
        Commands::Player(args) => commands::player::execute(args, config_path, writer).await,
        Commands::Alts(args) => commands::alts::execute(args, config_path, writer).await,
        Commands::Alerts(args) => commands::alerts::execute(args, config_path, writer).await,
        Commands::Ban(args) => commands::admin::execute_ban(args, config_path, writer).await,
        Commands::Unban(args) => commands::admin::execute_unban(args, config_path, writer).await,
        Commands::Notes(args) => commands::admin::execute_notes(args, config_path, writer).await,
        Commands::Stats(args) => commands::stats::execute(args, config_path, writer).await,
        Commands::Prune(args) => commands::prune::execute(args, config_path, writer).await,
        Commands::Config(args) => commands::config::execute(args, config_path, writer).await,
    }
}

/// Initialise tracing to stderr.
///
/// Precedence: `--log-level` flag, then `RUST_LOG`, then "info".
fn init_logging(level_flag: Option<&str>) {
    let filter = level_flag
        .map(str::to_owned)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_owned());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

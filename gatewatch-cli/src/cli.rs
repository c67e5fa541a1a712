//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Gatewatch -- player identity tracking for game servers.
///
/// Use `gatewatch <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "gatewatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the gatewatch.toml configuration file.
    #[arg(short, long, default_value = "gatewatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import historical log files into the identity store.
    Import(ImportArgs),

    /// Watch configured log sources continuously until interrupted.
    Watch(WatchArgs),

    /// Look up one identity by id or current name, with full history.
    Player(PlayerArgs),

    /// Find identities sharing an address or a name (alt correlation).
    Alts(AltsArgs),

    /// List or acknowledge alerts.
    Alerts(AlertsArgs),

    /// Mark an identity as banned in the store (bookkeeping only).
    Ban(BanArgs),

    /// Clear the banned flag of an identity.
    Unban(UnbanArgs),

    /// Attach an administrative note to an identity.
    Notes(NotesArgs),

    /// Show store statistics.
    Stats(StatsArgs),

    /// Delete connection events older than the retention window.
    Prune(PruneArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- import ----

/// Batch-import historical log files for one source.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Source (server) name recorded with each connection event.
    #[arg(short, long)]
    pub source: String,

    /// Log files to import, processed in the given order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

// ---- watch ----

/// Watch all configured sources until ctrl-c.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Do not print alerts to stdout (they are still stored and delivered).
    #[arg(long)]
    pub quiet: bool,
}

// ---- player ----

/// Look up an identity.
#[derive(Args, Debug)]
pub struct PlayerArgs {
    /// Identity id, or a substring of the current display name.
    pub query: String,

    /// Show full name/address history and recent events.
    #[arg(long)]
    pub history: bool,
}

// ---- alts ----

/// Alt-correlation queries.
#[derive(Args, Debug)]
pub struct AltsArgs {
    /// Find every identity that has used this address.
    #[arg(long, conflicts_with = "name")]
    pub address: Option<String>,

    /// Find every identity that has used a name containing this string.
    #[arg(long)]
    pub name: Option<String>,
}

// ---- alerts ----

/// List unacknowledged alerts, or acknowledge one.
#[derive(Args, Debug)]
pub struct AlertsArgs {
    /// Maximum number of alerts to list.
    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    /// Acknowledge the alert with this id instead of listing.
    #[arg(long)]
    pub ack: Option<i64>,
}

// ---- ban / unban / notes ----

/// Mark an identity as banned (store bookkeeping).
///
/// Actual enforcement (RCON kick/ban) is performed by the external
/// enforcement collaborator; this records the result.
#[derive(Args, Debug)]
pub struct BanArgs {
    /// Identity id to mark.
    pub identity_id: String,

    /// Ban reason recorded in the store.
    #[arg(short, long)]
    pub reason: String,
}

/// Clear the banned flag.
#[derive(Args, Debug)]
pub struct UnbanArgs {
    /// Identity id to clear.
    pub identity_id: String,
}

/// Attach an administrative note.
#[derive(Args, Debug)]
pub struct NotesArgs {
    /// Identity id to annotate.
    pub identity_id: String,

    /// Note text (replaces any previous note).
    pub text: String,
}

// ---- stats ----

/// Show store statistics.
#[derive(Args, Debug)]
pub struct StatsArgs {}

// ---- prune ----

/// Prune old connection events.
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Override the configured retention window (days).
    #[arg(long)]
    pub days: Option<u32>,
}

// ---- config ----

/// Configuration management.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration (file + env overrides).
    Show,
    /// Validate the configuration file and exit.
    Validate,
}

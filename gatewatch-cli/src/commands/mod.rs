//! Command handlers -- one module per subcommand
//!
//! `admin` bundles the small store-bookkeeping commands (ban/unban/notes).

pub mod admin;
pub mod alerts;
pub mod alts;
pub mod config;
pub mod import;
pub mod player;
pub mod prune;
pub mod stats;
pub mod watch;

use std::path::Path;

use gatewatch_core::config::GatewatchConfig;
use gatewatch_player_pipeline::PlayerStore;

use crate::error::CliError;

/// Load and validate the configuration file, applying env overrides.
pub(crate) async fn load_config(path: &Path) -> Result<GatewatchConfig, CliError> {
    GatewatchConfig::load(path)
        .await
        .map_err(|e| CliError::Config(e.to_string()))
}

/// Open the identity store referenced by the configuration.
pub(crate) fn open_store(config: &GatewatchConfig) -> Result<PlayerStore, CliError> {
    Ok(PlayerStore::open(&config.store.db_path)?)
}

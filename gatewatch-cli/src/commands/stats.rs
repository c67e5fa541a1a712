//! `gatewatch stats` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use gatewatch_core::types::StoreStats;

use crate::cli::StatsArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `stats` command.
pub async fn execute(
    _args: StatsArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    let stats = store.stats()?;
    writer.render(&StatsReport { stats })?;
    Ok(())
}

/// Store statistics payload.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Store-wide counters.
    pub stats: StoreStats,
}

impl Render for StatsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Identities:            {}", self.stats.total_identities)?;
        writeln!(w, "Banned:                {}", self.stats.banned_identities)?;
        writeln!(
            w,
            "Unacknowledged alerts: {}",
            self.stats.unacknowledged_alerts
        )?;
        writeln!(
            w,
            "Anonymizer addresses:  {}",
            self.stats.anonymizer_addresses
        )?;
        Ok(())
    }
}

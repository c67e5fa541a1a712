//! `gatewatch prune` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::cli::PruneArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `prune` command.
///
/// Deletes connection events older than the retention window. Identity and
/// alert rows are never touched by this maintenance operation.
pub async fn execute(
    args: PruneArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    let retention_days = args.days.unwrap_or(config.store.retention_days);
    if retention_days == 0 {
        return Err(CliError::Command(
            "retention window must be at least 1 day".to_owned(),
        ));
    }

    let deleted = store.prune_events(retention_days)?;
    writer.render(&PruneReport {
        retention_days,
        deleted,
    })?;
    Ok(())
}

/// Prune result payload.
#[derive(Debug, Serialize)]
pub struct PruneReport {
    /// Retention window that was applied (days).
    pub retention_days: u32,
    /// Number of deleted connection events.
    pub deleted: usize,
}

impl Render for PruneReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Deleted {} connection event(s) older than {} days",
            self.deleted, self.retention_days
        )
    }
}

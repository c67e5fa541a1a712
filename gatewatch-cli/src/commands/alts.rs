//! `gatewatch alts` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use gatewatch_core::types::IdentitySummary;

use crate::cli::AltsArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `alts` command.
pub async fn execute(
    args: AltsArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    let (criteria, matches) = match (&args.address, &args.name) {
        (Some(address), None) => (
            format!("address {address}"),
            store.find_by_address(address)?,
        ),
        (None, Some(name)) => (format!("name '{name}'"), store.find_by_name(name)?),
        _ => {
            return Err(CliError::Command(
                "provide exactly one of --address or --name".to_owned(),
            ));
        }
    };

    writer.render(&AltsReport { criteria, matches })?;
    Ok(())
}

/// Alt-correlation result payload.
#[derive(Debug, Serialize)]
pub struct AltsReport {
    /// Human-readable description of the search criteria.
    pub criteria: String,
    /// Matching identities, most recently used first.
    pub matches: Vec<IdentitySummary>,
}

impl Render for AltsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.matches.is_empty() {
            writeln!(w, "No identities found for {}", self.criteria)?;
            return Ok(());
        }
        writeln!(
            w,
            "{} identities for {}:",
            self.matches.len(),
            self.criteria
        )?;
        for summary in &self.matches {
            writeln!(
                w,
                "  {} ({}) last used {}",
                summary.current_name,
                summary.identity_id,
                summary.last_used.format("%Y-%m-%d %H:%M:%S UTC")
            )?;
        }
        Ok(())
    }
}

//! `gatewatch config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use gatewatch_core::config::GatewatchConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Show => {
            let config = super::load_config(config_path).await?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| CliError::Command(format!("failed to render config: {e}")))?;
            writer.render(&ConfigReport {
                path: config_path.display().to_string(),
                valid: true,
                resolved: Some(rendered),
            })?;
        }
        ConfigAction::Validate => {
            // load() already runs validation; reaching here means it passed
            GatewatchConfig::load(config_path)
                .await
                .map_err(|e| CliError::Config(e.to_string()))?;
            writer.render(&ConfigReport {
                path: config_path.display().to_string(),
                valid: true,
                resolved: None,
            })?;
        }
    }
    Ok(())
}

/// Configuration inspection payload.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    /// Path the configuration was loaded from.
    pub path: String,
    /// Whether validation passed.
    pub valid: bool,
    /// Resolved configuration as TOML (for `show`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        match &self.resolved {
            Some(resolved) => {
                writeln!(w, "# resolved from {}", self.path)?;
                write!(w, "{resolved}")?;
            }
            None => {
                writeln!(w, "{}: OK", self.path)?;
            }
        }
        Ok(())
    }
}

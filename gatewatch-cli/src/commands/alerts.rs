//! `gatewatch alerts` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use gatewatch_core::types::Alert;

use crate::cli::AlertsArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `alerts` command.
pub async fn execute(
    args: AlertsArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    if let Some(alert_id) = args.ack {
        if !store.acknowledge_alert(alert_id)? {
            return Err(CliError::NotFound(format!("alert #{alert_id}")));
        }
        writer.render(&AckReport { acknowledged: alert_id })?;
        return Ok(());
    }

    let alerts = store.unacknowledged_alerts(args.limit)?;
    writer.render(&AlertsReport { alerts })?;
    Ok(())
}

/// Alert listing payload.
#[derive(Debug, Serialize)]
pub struct AlertsReport {
    /// Unacknowledged alerts, newest first.
    pub alerts: Vec<Alert>,
}

impl Render for AlertsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.alerts.is_empty() {
            writeln!(w, "No unacknowledged alerts")?;
            return Ok(());
        }
        writeln!(w, "{} unacknowledged alert(s):", self.alerts.len())?;
        for alert in &self.alerts {
            writeln!(
                w,
                "  #{} [{}] {} - {}",
                alert.id,
                alert.kind,
                alert.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                alert.message
            )?;
        }
        Ok(())
    }
}

/// Acknowledgement payload.
#[derive(Debug, Serialize)]
pub struct AckReport {
    /// Alert id that was acknowledged.
    pub acknowledged: i64,
}

impl Render for AckReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Alert #{} acknowledged", self.acknowledged)
    }
}

//! `gatewatch player` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use gatewatch_core::types::{Identity, IdentityHistory};

use crate::cli::PlayerArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `player` command.
///
/// The query is tried first as an exact identity id, then as a substring
/// of the current display name.
pub async fn execute(
    args: PlayerArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    let identity = match store.identity(&args.query)? {
        Some(identity) => identity,
        None => store
            .identity_by_name(&args.query)?
            .ok_or_else(|| CliError::NotFound(format!("no identity matching '{}'", args.query)))?,
    };

    let history = if args.history {
        Some(store.identity_history(&identity.identity_id)?)
    } else {
        None
    };

    writer.render(&PlayerReport { identity, history })?;
    Ok(())
}

/// Player lookup payload.
#[derive(Debug, Serialize)]
pub struct PlayerReport {
    /// Current identity snapshot.
    pub identity: Identity,
    /// Full history when `--history` is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<IdentityHistory>,
}

impl Render for PlayerReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let identity = &self.identity;
        writeln!(w, "Identity:    {}", identity.identity_id)?;
        writeln!(w, "Name:        {}", identity.current_name)?;
        writeln!(
            w,
            "Address:     {}",
            identity.current_address.as_deref().unwrap_or("-")
        )?;
        writeln!(
            w,
            "Protocol id: {}",
            identity.protocol_ban_id.as_deref().unwrap_or("-")
        )?;
        writeln!(
            w,
            "First seen:  {}",
            identity.first_seen.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            w,
            "Last seen:   {}",
            identity.last_seen.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(w, "Connections: {}", identity.connection_count)?;
        if identity.banned {
            writeln!(
                w,
                "Banned:      yes ({})",
                identity.ban_reason.as_deref().unwrap_or("no reason recorded")
            )?;
        }
        if let Some(notes) = &identity.notes {
            writeln!(w, "Notes:       {notes}")?;
        }

        if let Some(history) = &self.history {
            writeln!(w)?;
            writeln!(w, "Names ({}):", history.names.len())?;
            for name_use in &history.names {
                writeln!(w, "  {} (used {}x)", name_use.name, name_use.use_count)?;
            }

            writeln!(w, "Addresses ({}):", history.addresses.len())?;
            for address_use in &history.addresses {
                let mut flags = String::new();
                if address_use.is_vpn {
                    flags.push_str(" [VPN]");
                }
                if address_use.is_proxy {
                    flags.push_str(" [proxy]");
                }
                writeln!(
                    w,
                    "  {} ({}){} used {}x",
                    address_use.address,
                    address_use.country.as_deref().unwrap_or("unknown"),
                    flags,
                    address_use.use_count
                )?;
            }

            if !history.protocol_id_changes.is_empty() {
                writeln!(w, "Protocol id changes:")?;
                for change in &history.protocol_id_changes {
                    writeln!(
                        w,
                        "  {} -> {} at {}",
                        change.old_id,
                        change.new_id,
                        change.changed_at.format("%Y-%m-%d %H:%M:%S UTC")
                    )?;
                }
            }

            writeln!(w, "Recent alerts ({}):", history.alerts.len())?;
            for alert in &history.alerts {
                writeln!(w, "  #{} [{}] {}", alert.id, alert.kind, alert.message)?;
            }
        }
        Ok(())
    }
}

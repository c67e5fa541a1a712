//! `gatewatch ban` / `unban` / `notes` command handlers
//!
//! These are store bookkeeping operations. Actual enforcement (RCON
//! kick/ban) is the external enforcement collaborator's job; library users
//! integrate it through `gatewatch_player_pipeline::enforce::ban_identity`.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::cli::{BanArgs, NotesArgs, UnbanArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `ban` command.
pub async fn execute_ban(
    args: BanArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    if !store.set_banned(&args.identity_id, &args.reason)? {
        return Err(CliError::NotFound(format!("identity {}", args.identity_id)));
    }
    writer.render(&AdminReport {
        identity_id: args.identity_id,
        action: "banned".to_owned(),
        detail: Some(args.reason),
    })?;
    Ok(())
}

/// Execute the `unban` command.
pub async fn execute_unban(
    args: UnbanArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    if !store.clear_ban(&args.identity_id)? {
        return Err(CliError::NotFound(format!("identity {}", args.identity_id)));
    }
    writer.render(&AdminReport {
        identity_id: args.identity_id,
        action: "unbanned".to_owned(),
        detail: None,
    })?;
    Ok(())
}

/// Execute the `notes` command.
pub async fn execute_notes(
    args: NotesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let store = super::open_store(&config)?;

    if !store.set_notes(&args.identity_id, &args.text)? {
        return Err(CliError::NotFound(format!("identity {}", args.identity_id)));
    }
    writer.render(&AdminReport {
        identity_id: args.identity_id,
        action: "notes updated".to_owned(),
        detail: Some(args.text),
    })?;
    Ok(())
}

/// Bookkeeping result payload.
#[derive(Debug, Serialize)]
pub struct AdminReport {
    /// Target identity id.
    pub identity_id: String,
    /// What happened.
    pub action: String,
    /// Reason or note text, when relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Render for AdminReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        match &self.detail {
            Some(detail) => writeln!(w, "{} {}: {}", self.identity_id, self.action, detail),
            None => writeln!(w, "{} {}", self.identity_id, self.action),
        }
    }
}

//! `gatewatch watch` command handler

use std::path::Path;

use colored::Colorize;

use gatewatch_core::pipeline::Pipeline;
use gatewatch_core::types::Severity;
use gatewatch_player_pipeline::{PipelineConfig, PlayerPipelineBuilder};

use crate::cli::WatchArgs;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `watch` command.
///
/// Starts one watch task per configured source and runs until ctrl-c.
/// Alerts are printed to stdout as they arrive; the store write has already
/// happened by then, so printing is purely informational.
pub async fn execute(
    args: WatchArgs,
    config_path: &Path,
    _writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    if config.monitor.sources.is_empty() {
        return Err(CliError::Config(
            "no [[monitor.sources]] configured, nothing to watch".to_owned(),
        ));
    }

    let pipeline_config = PipelineConfig::from_core(&config);
    let (mut pipeline, alert_rx) = PlayerPipelineBuilder::new()
        .config(pipeline_config)
        .build()?;

    pipeline.start().await?;

    let printer = alert_rx.map(|mut rx| {
        let quiet = args.quiet;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if quiet {
                    continue;
                }
                let line = format!(
                    "[{}] {} {}",
                    event.severity, event.alert.identity_id, event.alert.message
                );
                match event.severity {
                    Severity::High | Severity::Critical => println!("{}", line.red()),
                    Severity::Medium => println!("{}", line.yellow()),
                    _ => println!("{line}"),
                }
            }
        })
    });

    tracing::info!("watching {} source(s), press ctrl-c to stop", pipeline.source_count());
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    pipeline.stop().await?;
    if let Some(handle) = printer {
        handle.abort();
    }
    Ok(())
}

//! `gatewatch import` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use gatewatch_player_pipeline::monitor::BatchStats;
use gatewatch_player_pipeline::{PipelineConfig, PlayerPipelineBuilder};

use crate::cli::ImportArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `import` command.
///
/// Builds a pipeline without watch tasks and feeds the given files through
/// the batch path. Alerts generated during the import are tallied by kind.
pub async fn execute(
    args: ImportArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_config(config_path).await?;
    let pipeline_config = PipelineConfig::from_core(&config);

    let (pipeline, alert_rx) = PlayerPipelineBuilder::new()
        .config(pipeline_config)
        .build()?;

    // Drain the alert channel concurrently so a large import cannot fill it.
    let drain = alert_rx.map(|mut rx| {
        tokio::spawn(async move {
            let mut by_kind: BTreeMap<String, u64> = BTreeMap::new();
            while let Some(event) = rx.recv().await {
                *by_kind.entry(event.alert.kind.to_string()).or_insert(0) += 1;
            }
            by_kind
        })
    });

    let stats = pipeline.import_files(&args.source, &args.files).await;

    // Dropping the pipeline closes the alert sender and ends the drain task.
    drop(pipeline);
    let alerts_by_kind = match drain {
        Some(handle) => handle
            .await
            .map_err(|e| CliError::Command(format!("alert drain task failed: {e}")))?,
        None => BTreeMap::new(),
    };

    let report = ImportReport {
        source: args.source,
        files: args.files.len(),
        stats,
        alerts_by_kind,
    };
    writer.render(&report)?;
    Ok(())
}

/// Import result payload.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    /// Source name the events were recorded under.
    pub source: String,
    /// Number of files processed.
    pub files: usize,
    /// Aggregate counters.
    pub stats: BatchStats,
    /// Generated alerts tallied by kind.
    pub alerts_by_kind: BTreeMap<String, u64>,
}

impl Render for ImportReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Imported {} file(s) for source '{}'",
            self.files, self.source
        )?;
        writeln!(w, "  lines:        {}", self.stats.lines)?;
        writeln!(w, "  observations: {}", self.stats.observations)?;
        writeln!(w, "  alerts:       {}", self.stats.alerts)?;
        for (kind, count) in &self.alerts_by_kind {
            writeln!(w, "    {kind}: {count}")?;
        }
        writeln!(
            w,
            "  errors:       geo={} store={} io={}",
            self.stats.geo_failures, self.stats.store_errors, self.stats.io_errors
        )?;
        Ok(())
    }
}

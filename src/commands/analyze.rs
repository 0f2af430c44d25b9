use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::FleetConfig;
use crate::export::{export_aircraft_rows, export_rows_with_samples, write_csv, write_json};
use crate::inventory::{FinalizedInventory, FleetCollection};
use crate::sightings::read_sightings;
use crate::summary::FleetSummary;

use super::run_stage;

/// Where `analyze` writes its results. Every output is optional.
#[derive(Debug, Clone, Default, Args)]
pub struct AnalyzeOutputs {
    /// Fleet report CSV: one row per airline and aircraft type
    #[arg(long)]
    pub output_csv: Option<PathBuf>,

    /// Finalized inventories as JSON (input for `summary`, `compare`, `reconcile`)
    #[arg(long)]
    pub output_json: Option<PathBuf>,

    /// One row per registered aircraft with its country of registry
    #[arg(long)]
    pub aircraft_csv: Option<PathBuf>,

    /// Print the fleet summary to stdout
    #[arg(long)]
    pub print_summary: bool,
}

/// Timestamp for feed entries that carry none: the snapshot file's mtime
fn cycle_time_for(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Replay saved sightings into fleet inventories and write the requested
/// outputs. Files are ingested in the order given.
pub fn handle_analyze(
    config: &FleetConfig,
    inputs: &[PathBuf],
    outputs: &AnalyzeOutputs,
    zone: Option<&str>,
) -> Result<Vec<FinalizedInventory>> {
    if inputs.is_empty() {
        warn!("No sighting files given; inventories will be empty");
    }

    let directory = config.carrier_directory()?;
    let mut fleets = FleetCollection::new(directory)
        .with_canonical_registrations(config.canonicalize_registrations);

    run_stage("ingest", |metrics| {
        for path in inputs {
            let sightings = read_sightings(path, cycle_time_for(path))?;
            let batch = fleets.ingest_all(&sightings);
            info!(
                "{:?}: {} accepted, {} anonymous, {} without carrier, {} without type",
                path, batch.accepted, batch.anonymous, batch.skipped_no_carrier, batch.skipped_no_type
            );
            metrics.records_in += batch.total();
        }
        metrics.records_out = fleets.len();
        Ok(())
    })?;

    let stats = fleets.stats();
    info!(
        "Ingested {} sightings into {} airline inventories ({} skipped)",
        stats.total(),
        fleets.len(),
        stats.skipped()
    );

    let inventories = fleets.finalize_all();

    if let Some(path) = &outputs.output_csv {
        run_stage("export_fleet_csv", |metrics| {
            let rows = export_rows_with_samples(&inventories, config.sample_registrations);
            metrics.records_in = inventories.len();
            metrics.records_out = rows.len();
            write_csv(path, &rows)
        })?;
    }

    if let Some(path) = &outputs.aircraft_csv {
        run_stage("export_aircraft_csv", |metrics| {
            let prefixes = config.registry_prefixes()?;
            let rows = export_aircraft_rows(&inventories, &prefixes);
            metrics.records_in = inventories.len();
            metrics.records_out = rows.len();
            write_csv(path, &rows)
        })?;
    }

    if let Some(path) = &outputs.output_json {
        write_json(path, &inventories)?;
    }

    if outputs.print_summary {
        let mut summary = FleetSummary::from_inventories(&inventories);
        if let Some(zone) = zone {
            summary = summary.with_zone(zone);
        }
        println!("{}", summary.render());
    }

    Ok(inventories)
}

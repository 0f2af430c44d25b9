use anyhow::{Result, bail};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::companies::read_name_list;
use crate::export::write_fleet_sizes_csv;
use crate::reconcile::{
    FleetSizeEstimate, ReconciledFleetSize, ReconciledFleetSizes, estimates_from_inventories,
    estimates_from_row_counts, read_estimates_csv, reconcile, reconcile_targets,
};

use super::{load_inventories, run_stage};

/// Fleet-size sources shared by `reconcile` and `merge`.
///
/// Sources are read in a fixed order (estimate CSVs, then per-aircraft
/// listings, then inventories), each kind in the order given. That order is
/// what breaks ties between equally frequent sizes.
#[derive(Debug, Clone, Default, Args)]
pub struct EstimateSources {
    /// CSV with `airline_name,fleet_size[,source]` columns
    #[arg(long = "estimates")]
    pub estimates: Vec<PathBuf>,

    /// CSV with one row per aircraft; rows are counted per airline
    #[arg(long = "fleet-data")]
    pub fleet_data: Vec<PathBuf>,

    /// Airline column of the `--fleet-data` files
    #[arg(long, default_value = "airline_name")]
    pub fleet_data_column: String,

    /// Inventories JSON written by `analyze --output-json`
    #[arg(long = "inventory")]
    pub inventories: Vec<PathBuf>,
}

impl EstimateSources {
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty() && self.fleet_data.is_empty() && self.inventories.is_empty()
    }

    /// Every estimate from every source, in source order
    pub fn collect(&self) -> Result<Vec<FleetSizeEstimate>> {
        if self.is_empty() {
            bail!("No fleet-size sources given (use --estimates, --fleet-data or --inventory)");
        }

        let mut all = Vec::new();
        for path in &self.estimates {
            all.extend(read_estimates_csv(path)?);
        }
        for path in &self.fleet_data {
            let names = read_name_list(path, &self.fleet_data_column)?;
            let source = path.display().to_string();
            all.extend(estimates_from_row_counts(names.iter().map(String::as_str), &source));
        }
        for path in &self.inventories {
            let inventories = load_inventories(path)?;
            all.extend(estimates_from_inventories(&inventories, &path.display().to_string()));
        }

        info!("Collected {} fleet-size estimates", all.len());
        Ok(all)
    }

    /// Collect and reconcile in one stage
    pub fn reconcile(&self) -> Result<ReconciledFleetSizes> {
        run_stage("reconcile", |metrics| {
            let estimates = self.collect()?;
            let reconciled = reconcile(&estimates);
            metrics.records_in = estimates.len();
            metrics.records_out = reconciled.len();
            Ok(reconciled)
        })
    }
}

/// Reconcile fleet sizes from every source and write `airline,fleet_size,
/// fleet_size_known`. With a target list, one row per target in list order;
/// otherwise one row per airline that has estimates.
pub fn handle_reconcile(
    sources: &EstimateSources,
    targets: Option<(&Path, &str)>,
    output: &Path,
) -> Result<Vec<(String, ReconciledFleetSize)>> {
    let estimates = sources.collect()?;

    let rows = run_stage("reconcile", |metrics| {
        metrics.records_in = estimates.len();
        let rows = match targets {
            Some((path, column)) => reconcile_targets(&read_name_list(path, column)?, &estimates),
            None => {
                let reconciled = reconcile(&estimates);
                reconciled
                    .iter()
                    .map(|(name, value)| (name.to_string(), ReconciledFleetSize::Known(value)))
                    .collect()
            }
        };
        metrics.records_out = rows.len();
        Ok(rows)
    })?;

    let unknown = rows.iter().filter(|(_, size)| !size.is_known()).count();
    info!(
        "Reconciled {} airlines ({} without any estimate)",
        rows.len(),
        unknown
    );

    write_fleet_sizes_csv(output, &rows)?;
    Ok(rows)
}

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::companies::{
    CompanyTable, correct_fleet_sizes, join_fleet_sizes, read_companies_csv, write_companies_csv,
};

use super::reconcile::EstimateSources;
use super::run_stage;

/// Default output next to the input: `companies.csv` -> `companies_with_fleet.csv`
fn joined_path(companies: &Path) -> PathBuf {
    let stem = companies
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("companies");
    companies.with_file_name(format!("{stem}_with_fleet.csv"))
}

/// Attach reconciled fleet sizes to a company table.
///
/// In join mode every company gains `fleet_size` and `fleet_size_known`. In
/// correct mode an existing `fleet_size` column is fixed in place, and the
/// file is only rewritten when something changed.
pub fn handle_merge(
    sources: &EstimateSources,
    companies_path: &Path,
    output: Option<&Path>,
    correct: bool,
) -> Result<CompanyTable> {
    let sizes = sources.reconcile()?;
    let mut companies = read_companies_csv(companies_path)?;

    if correct {
        let corrected = run_stage("correct_fleet_sizes", |metrics| {
            metrics.records_in = companies.len();
            let corrected = correct_fleet_sizes(&mut companies, &sizes);
            metrics.records_out = corrected;
            Ok(corrected)
        })?;

        let target = output.unwrap_or(companies_path);
        if corrected > 0 || output.is_some() {
            write_companies_csv(target, &companies)?;
        } else {
            info!("No corrections needed, leaving {:?} untouched", companies_path);
        }
        return Ok(companies);
    }

    let joined = run_stage("join_fleet_sizes", |metrics| {
        metrics.records_in = companies.len();
        let joined = join_fleet_sizes(&companies, &sizes);
        metrics.records_out = joined.len();
        Ok(joined)
    })?;

    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| joined_path(companies_path));
    write_companies_csv(&target, &joined)?;
    Ok(joined)
}

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::companies::{FleetSizeBand, read_companies_csv, read_name_list, select_in_band};
use crate::export::{Tabular, write_csv};

use super::run_stage;

#[derive(Debug, Serialize)]
struct SelectedCompany<'a> {
    company_name: &'a str,
}

impl Tabular for SelectedCompany<'_> {
    const COLUMNS: &'static [&'static str] = &["company_name"];
}

/// Write the sorted names of companies whose fleet size lies in `band`,
/// optionally restricted to the names in an allow-list column.
pub fn handle_select(
    companies_path: &Path,
    band: FleetSizeBand,
    allow_list: Option<(&Path, &str)>,
    output: &Path,
) -> Result<Vec<String>> {
    let companies = read_companies_csv(companies_path)?;
    let allowed = match allow_list {
        Some((path, column)) => Some(read_name_list(path, column)?),
        None => None,
    };

    let selected = run_stage("select_in_band", |metrics| {
        metrics.records_in = companies.len();
        let selected = select_in_band(&companies, band, allowed.as_deref());
        metrics.records_out = selected.len();
        Ok(selected)
    })?;

    info!(
        "Selected {} companies with {} < fleet size <= {}",
        selected.len(),
        band.min_exclusive,
        band.max_inclusive
    );

    let rows: Vec<SelectedCompany> = selected
        .iter()
        .map(|name| SelectedCompany { company_name: name })
        .collect();
    write_csv(output, &rows)?;
    Ok(selected)
}

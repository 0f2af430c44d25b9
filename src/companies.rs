//! Company tables: joining reconciled fleet sizes onto an external list of
//! companies, correcting stale sizes, and selecting small operators.
//!
//! Company tables come from other tools with their own columns. Every column
//! is kept as-is; only `company_name` is required, and `fleet_size` /
//! `fleet_size_known` are added or rewritten.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::normalize::normalize;
use crate::reconcile::{ReconciledFleetSize, ReconciledFleetSizes};

pub const COMPANY_NAME_COLUMN: &str = "company_name";
pub const FLEET_SIZE_COLUMN: &str = "fleet_size";
pub const FLEET_SIZE_KNOWN_COLUMN: &str = "fleet_size_known";

/// A CSV table of companies with its original header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    name_index: usize,
}

impl CompanyTable {
    /// Build a table in memory. Short rows are padded with empty cells; a
    /// missing `company_name` column or a row wider than the header fails.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let name_index = headers
            .iter()
            .position(|h| h.trim() == COMPANY_NAME_COLUMN)
            .ok_or_else(|| anyhow!("Company table has no {:?} column", COMPANY_NAME_COLUMN))?;

        let width = headers.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (index, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                bail!(
                    "Row {} has {} cells but the header has {}",
                    index + 1,
                    row.len(),
                    width
                );
            }
            row.resize(width, String::new());
            padded.push(row);
        }

        Ok(Self {
            headers,
            rows: padded,
            name_index,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == column)
    }

    /// Company names in row order, trimmed
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row[self.name_index].trim())
    }

    /// Cell value for `column` on row `index`
    pub fn value(&self, index: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(index).map(|row| row[col].as_str())
    }

    /// Index of `column`, appending it (empty cells) when missing
    fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(index) = self.column_index(column) {
            return index;
        }
        self.headers.push(column.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }
}

/// Read a company CSV. Short rows are padded so every row has every column;
/// a row with more fields than the header is an error.
pub fn read_companies_csv<P: AsRef<Path>>(path: P) -> Result<CompanyTable> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Opening {:?}", path))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Reading header of {:?}", path))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Parsing CSV line {}", index + 2))?;
        if record.len() > headers.len() {
            bail!(
                "Parsing CSV line {} of {:?}: {} fields but the header has {}",
                index + 2,
                path,
                record.len(),
                headers.len()
            );
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    let table = CompanyTable::new(headers, rows).with_context(|| format!("Loading {:?}", path))?;
    info!("Read {} companies from {:?}", table.len(), path);
    Ok(table)
}

pub fn write_companies_csv<P: AsRef<Path>>(path: P, table: &CompanyTable) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    writer
        .write_record(&table.headers)
        .with_context(|| format!("Failed to write header to {}", path.display()))?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    info!("Wrote {} companies to {}", table.len(), path.display());
    Ok(())
}

/// Left join: every company keeps its row and gains `fleet_size` (0 when
/// unknown) and `fleet_size_known`. Existing columns of those names are
/// overwritten.
pub fn join_fleet_sizes(companies: &CompanyTable, sizes: &ReconciledFleetSizes) -> CompanyTable {
    let mut joined = companies.clone();
    let size_col = joined.ensure_column(FLEET_SIZE_COLUMN);
    let known_col = joined.ensure_column(FLEET_SIZE_KNOWN_COLUMN);

    let mut matched = 0usize;
    let name_index = joined.name_index;
    for row in &mut joined.rows {
        let size = sizes.get(&row[name_index]);
        if size.is_known() {
            matched += 1;
        }
        row[size_col] = size.export_value().to_string();
        row[known_col] = size.is_known().to_string();
    }

    info!(
        "Joined fleet sizes onto {} companies ({} with a known size)",
        joined.len(),
        matched
    );
    joined
}

/// Overwrite `fleet_size` where a reconciled value is known and differs from
/// what the table holds. Companies without an estimate are left untouched.
/// Returns the number of rows changed.
pub fn correct_fleet_sizes(companies: &mut CompanyTable, sizes: &ReconciledFleetSizes) -> usize {
    let Some(size_col) = companies.column_index(FLEET_SIZE_COLUMN) else {
        warn!("Company table has no {:?} column, nothing to correct", FLEET_SIZE_COLUMN);
        return 0;
    };
    let known_col = companies.column_index(FLEET_SIZE_KNOWN_COLUMN);

    let name_index = companies.name_index;
    let mut corrected = 0usize;
    for row in &mut companies.rows {
        let ReconciledFleetSize::Known(expected) = sizes.get(&row[name_index]) else {
            continue;
        };
        let current = row[size_col].trim().parse::<u32>().ok();
        if current != Some(expected) {
            debug!(
                "Correcting fleet size for {:?}: {:?} -> {}",
                row[name_index].trim(),
                row[size_col],
                expected
            );
            row[size_col] = expected.to_string();
            if let Some(col) = known_col {
                row[col] = "true".to_string();
            }
            corrected += 1;
        }
    }

    if corrected == 0 {
        info!("All fleet sizes are consistent");
    } else {
        info!("Corrected {} fleet sizes", corrected);
    }
    corrected
}

/// Fleet sizes of interest: `min_exclusive < size <= max_inclusive`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSizeBand {
    pub min_exclusive: u32,
    pub max_inclusive: u32,
}

impl Default for FleetSizeBand {
    fn default() -> Self {
        Self {
            min_exclusive: 2,
            max_inclusive: 25,
        }
    }
}

impl FleetSizeBand {
    pub fn contains(&self, size: u32) -> bool {
        size > self.min_exclusive && size <= self.max_inclusive
    }
}

/// Sorted distinct names of companies whose fleet size falls in `band`.
///
/// Sizes come from the table's `fleet_size` column; rows explicitly marked
/// `fleet_size_known = false` and rows with a blank or non-numeric size are
/// ignored. With an allow-list, only companies whose normalized name is on it
/// are considered.
pub fn select_in_band(
    companies: &CompanyTable,
    band: FleetSizeBand,
    allow_list: Option<&[String]>,
) -> Vec<String> {
    let Some(size_col) = companies.column_index(FLEET_SIZE_COLUMN) else {
        warn!("Company table has no {:?} column, nothing to select", FLEET_SIZE_COLUMN);
        return Vec::new();
    };
    let known_col = companies.column_index(FLEET_SIZE_KNOWN_COLUMN);
    let allowed: Option<HashSet<String>> =
        allow_list.map(|names| names.iter().map(|n| normalize(n)).collect());

    let mut selected = BTreeSet::new();
    for row in &companies.rows {
        let name = row[companies.name_index].trim();
        if name.is_empty() {
            continue;
        }
        if let Some(allowed) = &allowed {
            if !allowed.contains(&normalize(name)) {
                continue;
            }
        }
        let marked_unknown = known_col
            .map(|col| row[col].trim().eq_ignore_ascii_case("false"))
            .unwrap_or(false);
        if marked_unknown {
            continue;
        }
        let Ok(size) = row[size_col].trim().parse::<u32>() else {
            continue;
        };
        if band.contains(size) {
            selected.insert(name.to_string());
        }
    }

    selected.into_iter().collect()
}

/// Non-blank values of one column of a CSV, e.g. an airline allow-list
pub fn read_name_list<P: AsRef<Path>>(path: P, column: &str) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("Opening {:?}", path))?;
    let index = reader
        .headers()
        .with_context(|| format!("Reading header of {:?}", path))?
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| anyhow!("{:?} has no {:?} column", path, column))?;

    let mut names = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Parsing CSV line {}", line + 2))?;
        let value = record.get(index).unwrap_or("").trim();
        if !value.is_empty() {
            names.push(value.to_string());
        }
    }
    Ok(names)
}

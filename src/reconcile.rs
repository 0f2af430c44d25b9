//! Fleet-size reconciliation across independently collected datasets.
//!
//! Each dataset contributes at most one candidate size per airline. The
//! trusted value is the statistical mode of the candidates; when several values
//! share the highest frequency the one seen first in input order wins, and
//! when every value is distinct that means the first estimate. Airlines with no
//! estimates at all are `Unknown`, which only becomes `0` at export.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::inventory::FinalizedInventory;
use crate::normalize::normalize;

/// "45 aircraft", "1 Aircraft" as scraped from airline listing pages. The
/// count must open the cell so signs, decimals and separators never match.
static AIRCRAFT_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+)\s*aircraft\b").unwrap());

/// One candidate fleet size for one airline from one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSizeEstimate {
    pub airline_normalized_name: String,
    pub value: u32,
    pub source: String,
}

impl FleetSizeEstimate {
    /// Build an estimate from a display name; the name is normalized here
    pub fn new(airline_name: &str, value: u32, source: &str) -> Self {
        Self {
            airline_normalized_name: normalize(airline_name),
            value,
            source: source.to_string(),
        }
    }
}

/// Parse a fleet-size cell. Plain integers and text starting with
/// "N aircraft" are accepted; anything else (blank, negative, decimal,
/// "1,200 aircraft", free text) yields `None` so the estimate is dropped
/// instead of becoming a wrong number.
pub fn parse_fleet_size(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<u32>() {
        return Some(value);
    }
    AIRCRAFT_COUNT_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Most frequent value; ties go to the value that appeared first.
/// `None` only for an empty slice.
pub fn mode_first_seen(values: &[u32]) -> Option<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for &value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    // Walk in input order so the earliest value wins ties
    let mut best: Option<(u32, usize)> = None;
    for &value in values {
        let count = counts[&value];
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value)
}

/// Reconciled size for one airline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ReconciledFleetSize {
    Known(u32),
    /// No estimate exists for this airline
    Unknown,
}

impl ReconciledFleetSize {
    pub fn is_known(&self) -> bool {
        matches!(self, ReconciledFleetSize::Known(_))
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            ReconciledFleetSize::Known(value) => Some(*value),
            ReconciledFleetSize::Unknown => None,
        }
    }

    /// Value written to flat files; unknown is represented as 0
    pub fn export_value(&self) -> u32 {
        self.value().unwrap_or(0)
    }
}

/// Reconciled sizes keyed by normalized airline name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledFleetSizes {
    sizes: BTreeMap<String, u32>,
    /// Estimates per airline, in input order
    candidates: BTreeMap<String, Vec<u32>>,
}

impl ReconciledFleetSizes {
    /// Size for `airline`; the name is normalized before lookup
    pub fn get(&self, airline: &str) -> ReconciledFleetSize {
        match self.sizes.get(&normalize(airline)) {
            Some(&value) => ReconciledFleetSize::Known(value),
            None => ReconciledFleetSize::Unknown,
        }
    }

    /// Candidate values that fed the decision for `airline`, in input order
    pub fn candidates(&self, airline: &str) -> &[u32] {
        self.candidates
            .get(&normalize(airline))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.sizes.iter().map(|(name, &value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

/// Group estimates by normalized airline name and pick one size per airline.
pub fn reconcile(estimates: &[FleetSizeEstimate]) -> ReconciledFleetSizes {
    let mut candidates: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for estimate in estimates {
        // Names built by hand may not be normalized yet
        let key = normalize(&estimate.airline_normalized_name);
        candidates.entry(key).or_default().push(estimate.value);
    }

    let mut sizes = BTreeMap::new();
    for (airline, values) in &candidates {
        if let Some(chosen) = mode_first_seen(values) {
            if values.iter().any(|&v| v != chosen) {
                debug!(
                    "Conflicting fleet sizes for {:?}: {:?}, keeping {}",
                    airline, values, chosen
                );
            }
            sizes.insert(airline.clone(), chosen);
        }
    }

    ReconciledFleetSizes { sizes, candidates }
}

/// One reconciled entry per target airline, in target order. Targets with no
/// estimates come back `Unknown`.
pub fn reconcile_targets(
    targets: &[String],
    estimates: &[FleetSizeEstimate],
) -> Vec<(String, ReconciledFleetSize)> {
    let reconciled = reconcile(estimates);
    targets
        .iter()
        .map(|target| (target.clone(), reconciled.get(target)))
        .collect()
}

/// Observed unique aircraft per airline as an estimate source
pub fn estimates_from_inventories(
    inventories: &[FinalizedInventory],
    source: &str,
) -> Vec<FleetSizeEstimate> {
    inventories
        .iter()
        .map(|inventory| FleetSizeEstimate {
            airline_normalized_name: normalize(&inventory.airline_name),
            value: u32::try_from(inventory.total_unique_registrations).unwrap_or(u32::MAX),
            source: source.to_string(),
        })
        .collect()
}

/// One row per aircraft, counted per normalized airline name. Blank names are
/// not counted. Output is ordered by normalized name.
pub fn estimates_from_row_counts<'a, I>(airline_names: I, source: &str) -> Vec<FleetSizeEstimate>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for name in airline_names {
        let key = normalize(name);
        if key.is_empty() {
            continue;
        }
        *counts.entry(key).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(airline_normalized_name, value)| FleetSizeEstimate {
            airline_normalized_name,
            value,
            source: source.to_string(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct EstimateRow {
    airline_name: String,
    #[serde(default)]
    fleet_size: String,
    #[serde(default)]
    source: String,
}

/// Read estimates from a CSV with `airline_name,fleet_size[,source]` columns.
/// Rows with a missing or unparseable size are dropped. A missing `source`
/// column falls back to the file stem.
pub fn read_estimates_csv<P: AsRef<Path>>(path: P) -> Result<Vec<FleetSizeEstimate>> {
    let path = path.as_ref();
    let default_source = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("estimates")
        .to_string();

    let mut reader = csv::Reader::from_path(path).with_context(|| format!("Opening {:?}", path))?;

    let mut out = Vec::new();
    let mut dropped = 0usize;
    for (index, row) in reader.deserialize::<EstimateRow>().enumerate() {
        let row = row.with_context(|| format!("Parsing CSV line {}", index + 2))?;
        let Some(value) = parse_fleet_size(&row.fleet_size) else {
            debug!(
                "Dropping estimate for {:?} on line {}: unparseable size {:?}",
                row.airline_name,
                index + 2,
                row.fleet_size
            );
            dropped += 1;
            continue;
        };
        let source = if row.source.trim().is_empty() {
            default_source.as_str()
        } else {
            row.source.trim()
        };
        out.push(FleetSizeEstimate::new(&row.airline_name, value, source));
    }

    info!(
        "Read {} fleet-size estimates from {:?} ({} dropped)",
        out.len(),
        path,
        dropped
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimates(airline: &str, values: &[u32]) -> Vec<FleetSizeEstimate> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| FleetSizeEstimate::new(airline, v, &format!("source-{i}")))
            .collect()
    }

    #[test]
    fn test_mode_wins() {
        let reconciled = reconcile(&estimates("X", &[10, 20, 10]));
        assert_eq!(reconciled.get("X"), ReconciledFleetSize::Known(10));
    }

    #[test]
    fn test_no_mode_takes_first() {
        let reconciled = reconcile(&estimates("X", &[10, 20]));
        assert_eq!(reconciled.get("X"), ReconciledFleetSize::Known(10));

        let reconciled = reconcile(&estimates("X", &[20, 10]));
        assert_eq!(reconciled.get("X"), ReconciledFleetSize::Known(20));
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        assert_eq!(mode_first_seen(&[7, 3, 3, 7]), Some(7));
        assert_eq!(mode_first_seen(&[3, 7, 7, 3]), Some(3));
        assert_eq!(mode_first_seen(&[5, 9, 9, 5, 1, 1, 1]), Some(1));
        assert_eq!(mode_first_seen(&[0]), Some(0));
        assert_eq!(mode_first_seen(&[]), None);
    }

    #[test]
    fn test_groups_by_normalized_name() {
        let mut all = estimates("Aéro Lloyd", &[12]);
        all.extend(estimates("AERO LLOYD", &[14]));
        all.extend(estimates(" aero  lloyd ", &[14]));
        all.extend(estimates("Air Malta", &[6]));

        let reconciled = reconcile(&all);
        assert_eq!(reconciled.len(), 2);
        assert_eq!(reconciled.get("Aero Lloyd"), ReconciledFleetSize::Known(14));
        assert_eq!(reconciled.candidates("aero lloyd"), &[12, 14, 14]);
        assert_eq!(reconciled.get("Air Malta"), ReconciledFleetSize::Known(6));
    }

    #[test]
    fn test_unknown_is_distinct_from_zero() {
        let reconciled = reconcile(&estimates("Ghost Air", &[0]));
        let known_zero = reconciled.get("Ghost Air");
        let missing = reconciled.get("Nowhere Airways");

        assert_eq!(known_zero, ReconciledFleetSize::Known(0));
        assert!(known_zero.is_known());
        assert_eq!(missing, ReconciledFleetSize::Unknown);
        assert!(!missing.is_known());
        assert_eq!(known_zero.export_value(), missing.export_value());
    }

    #[test]
    fn test_reconcile_targets_keeps_order() {
        let targets = vec!["Finnair".to_string(), "Iberia".to_string()];
        let result = reconcile_targets(&targets, &estimates("Iberia", &[70, 70, 68]));
        assert_eq!(
            result,
            vec![
                ("Finnair".to_string(), ReconciledFleetSize::Unknown),
                ("Iberia".to_string(), ReconciledFleetSize::Known(70)),
            ]
        );
    }

    #[test]
    fn test_parse_fleet_size() {
        assert_eq!(parse_fleet_size("45"), Some(45));
        assert_eq!(parse_fleet_size(" 45 "), Some(45));
        assert_eq!(parse_fleet_size("45 aircraft"), Some(45));
        assert_eq!(parse_fleet_size("1 Aircraft"), Some(1));
        assert_eq!(parse_fleet_size(""), None);
        assert_eq!(parse_fleet_size("-3"), None);
        assert_eq!(parse_fleet_size("n/a"), None);
        assert_eq!(parse_fleet_size("12.5"), None);
        assert_eq!(parse_fleet_size("45 aircraft in service"), Some(45));
        assert_eq!(parse_fleet_size("-3 aircraft"), None);
        assert_eq!(parse_fleet_size("12.5 aircraft"), None);
        assert_eq!(parse_fleet_size("1,200 aircraft"), None);
        assert_eq!(parse_fleet_size("about 40 aircraft"), None);
        assert_eq!(parse_fleet_size("45 aircraftcarriers"), None);
    }

    #[test]
    fn test_estimates_from_row_counts() {
        let rows = ["Air France", "AIR FRANCE", "Vueling", "", "air  france"];
        let estimates = estimates_from_row_counts(rows, "fleet_data");
        assert_eq!(
            estimates,
            vec![
                FleetSizeEstimate::new("air france", 3, "fleet_data"),
                FleetSizeEstimate::new("vueling", 1, "fleet_data"),
            ]
        );
    }

    #[test]
    fn test_estimates_from_inventories_saturates() {
        let inventory = |name: &str, total: usize| FinalizedInventory {
            carrier_code: "XXX".to_string(),
            airline_name: name.to_string(),
            normalized_name: normalize(name),
            aircraft_types: BTreeMap::new(),
            all_registrations: Vec::new(),
            total_unique_registrations: total,
            observed_sightings: 0,
            aircraft: Vec::new(),
        };

        let estimates = estimates_from_inventories(
            &[inventory("Air Malta", 6), inventory("Big Fleet", usize::MAX)],
            "observed",
        );
        assert_eq!(estimates[0].value, 6);
        assert_eq!(estimates[0].airline_normalized_name, "air malta");
        assert_eq!(estimates[1].value, u32::MAX);
    }

    #[test]
    fn test_read_estimates_csv_drops_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrape_a.csv");
        std::fs::write(
            &path,
            "airline_name,fleet_size,source\n\
             Air Malta,6,listing\n\
             Croatia Airlines,,listing\n\
             Finnair,81 aircraft,\n\
             Iberia,unknown,listing\n",
        )
        .unwrap();

        let estimates = read_estimates_csv(&path).unwrap();
        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0].airline_normalized_name, "air malta");
        assert_eq!(estimates[0].source, "listing");
        assert_eq!(estimates[1].value, 81);
        assert_eq!(estimates[1].source, "scrape_a");
    }
}

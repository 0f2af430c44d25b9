pub mod analyze;
pub mod compare;
pub mod merge;
pub mod reconcile;
pub mod select;
pub mod summary;

pub use analyze::{AnalyzeOutputs, handle_analyze};
pub use compare::handle_compare;
pub use merge::handle_merge;
pub use reconcile::{EstimateSources, handle_reconcile};
pub use select::handle_select;
pub use summary::handle_summary;

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

use crate::inventory::FinalizedInventory;

/// Timing and record counts for one stage of a command
#[derive(Debug, Clone)]
pub struct StageMetrics {
    pub name: String,
    pub duration_secs: f64,
    pub records_in: usize,
    pub records_out: usize,
    pub success: bool,
    pub error_message: Option<String>,
}

impl StageMetrics {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            duration_secs: 0.0,
            records_in: 0,
            records_out: 0,
            success: true,
            error_message: None,
        }
    }
}

/// Helper function to record metrics for a command stage
fn record_stage_metrics(metrics: &StageMetrics) {
    let stage_name = metrics.name.clone();
    metrics::histogram!("fleet.stage.duration_seconds", "stage" => stage_name.clone())
        .record(metrics.duration_secs);
    metrics::counter!("fleet.stage.records_in_total", "stage" => stage_name.clone())
        .increment(metrics.records_in as u64);
    metrics::counter!("fleet.stage.records_out_total", "stage" => stage_name.clone())
        .increment(metrics.records_out as u64);
    metrics::gauge!("fleet.stage.success", "stage" => stage_name)
        .set(if metrics.success { 1.0 } else { 0.0 });
}

/// Run one stage, timing it and recording its metrics whether it succeeds
/// or not. The closure fills in the record counts.
pub(crate) fn run_stage<T, F>(name: &str, stage: F) -> Result<T>
where
    F: FnOnce(&mut StageMetrics) -> Result<T>,
{
    let start = Instant::now();
    let mut metrics = StageMetrics::new(name);

    let result = stage(&mut metrics);
    metrics.duration_secs = start.elapsed().as_secs_f64();

    match &result {
        Ok(_) => info!(
            "Stage {} finished in {:.2}s: {} in, {} out",
            metrics.name, metrics.duration_secs, metrics.records_in, metrics.records_out
        ),
        Err(e) => {
            error!("Stage {} failed: {:#}", metrics.name, e);
            metrics.success = false;
            metrics.error_message = Some(e.to_string());
        }
    }

    record_stage_metrics(&metrics);
    result
}

/// Load finalized inventories written by `analyze --output-json`. Counts are
/// recomputed and each registration is filed under one type, so hand-edited
/// files still satisfy the inventory invariants.
pub fn load_inventories(path: &Path) -> Result<Vec<FinalizedInventory>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let inventories: Vec<FinalizedInventory> =
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;

    info!("Loaded {} inventories from {:?}", inventories.len(), path);
    Ok(inventories.into_iter().map(FinalizedInventory::finalize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_run_stage_passes_result_through() {
        let value = run_stage("count", |metrics| {
            metrics.records_in = 3;
            metrics.records_out = 2;
            Ok(2)
        })
        .unwrap();
        assert_eq!(value, 2);

        let failed: Result<()> = run_stage("broken", |_| Err(anyhow!("boom")));
        assert_eq!(failed.unwrap_err().to_string(), "boom");
    }

    #[test]
    fn test_load_inventories_refinalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.json");
        std::fs::write(
            &path,
            r#"[{
                "carrier_code": "AMC",
                "airline_name": "Air Malta",
                "normalized_name": "",
                "aircraft_types": {
                    "A320": {"observed_count": 3, "unique_count": 0, "registrations": ["9H-AEO", "9H-AEI"]}
                },
                "all_registrations": [],
                "total_unique_registrations": 0,
                "observed_sightings": 3
            }]"#,
        )
        .unwrap();

        let inventories = load_inventories(&path).unwrap();
        assert_eq!(inventories.len(), 1);
        let amc = &inventories[0];
        assert!(amc.is_consistent());
        assert_eq!(amc.normalized_name, "air malta");
        assert_eq!(amc.total_unique_registrations, 2);
        assert_eq!(amc.all_registrations, vec!["9H-AEI", "9H-AEO"]);
    }

    #[test]
    fn test_load_inventories_files_registration_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.json");
        std::fs::write(
            &path,
            r#"[{
                "carrier_code": "EZY",
                "airline_name": "easyJet",
                "normalized_name": "easyjet",
                "aircraft_types": {
                    "A319": {"observed_count": 1, "unique_count": 1, "registrations": ["G-EZAA"]},
                    "A320": {"observed_count": 2, "unique_count": 1, "registrations": ["G-EZAA"]}
                },
                "all_registrations": ["G-EZAA"],
                "total_unique_registrations": 1,
                "observed_sightings": 3,
                "aircraft": [{
                    "registration": "G-EZAA",
                    "aircraft_type": "A320",
                    "detailed_type": "",
                    "last_observed": "2025-06-01T12:02:00Z"
                }]
            }]"#,
        )
        .unwrap();

        let inventories = load_inventories(&path).unwrap();
        let ezy = &inventories[0];
        assert!(ezy.is_consistent());
        assert_eq!(ezy.unique_count("A319"), 0);
        assert_eq!(ezy.unique_count("A320"), 1);
        assert_eq!(ezy.aircraft_types["A319"].observed_count, 1);
    }
}

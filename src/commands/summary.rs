use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::summary::FleetSummary;

use super::load_inventories;

/// Render the fleet report for saved inventories, printing it or writing it
/// to `output`.
pub fn handle_summary(inventory_path: &Path, zone: Option<&str>, output: Option<&Path>) -> Result<String> {
    let inventories = load_inventories(inventory_path)?;

    let mut summary = FleetSummary::from_inventories(&inventories);
    if let Some(zone) = zone {
        summary = summary.with_zone(zone);
    }
    let text = summary.render();

    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Fleet report written to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(text)
}

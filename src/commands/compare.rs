use anyhow::Result;
use std::path::Path;

use crate::summary::ZoneComparison;

use super::load_inventories;

/// Compare two saved runs, matching airlines on carrier code
pub fn handle_compare(
    first: (&str, &Path),
    second: (&str, &Path),
    as_json: bool,
) -> Result<ZoneComparison> {
    let (first_zone, first_path) = first;
    let (second_zone, second_path) = second;

    let comparison = ZoneComparison::compare(
        first_zone,
        &load_inventories(first_path)?,
        second_zone,
        &load_inventories(second_path)?,
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        println!("{}", comparison.render());
    }
    Ok(comparison)
}

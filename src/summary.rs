//! Human-readable fleet reports and two-zone comparisons.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::inventory::FinalizedInventory;

const RULE_WIDTH: usize = 50;

/// Per-airline section of a fleet report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirlineSummary {
    pub carrier_code: String,
    pub airline_name: String,
    pub total_unique_registrations: usize,
    pub type_count: usize,
    /// (type, unique registrations), largest first; empty types omitted
    pub types: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub zone: Option<String>,
    pub airline_count: usize,
    pub total_aircraft: usize,
    pub distinct_types: usize,
    /// Ordered by total unique registrations, largest first
    pub airlines: Vec<AirlineSummary>,
}

impl FleetSummary {
    pub fn from_inventories(inventories: &[FinalizedInventory]) -> Self {
        let mut all_types = BTreeSet::new();
        let mut airlines: Vec<AirlineSummary> = inventories
            .iter()
            .map(|inventory| {
                all_types.extend(inventory.aircraft_types.keys().cloned());

                let mut types: Vec<(String, usize)> = inventory
                    .aircraft_types
                    .iter()
                    .filter(|(_, bucket)| bucket.unique_count > 0)
                    .map(|(type_key, bucket)| (type_key.clone(), bucket.unique_count))
                    .collect();
                types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

                AirlineSummary {
                    carrier_code: inventory.carrier_code.clone(),
                    airline_name: inventory.airline_name.clone(),
                    total_unique_registrations: inventory.total_unique_registrations,
                    type_count: inventory.aircraft_types.len(),
                    types,
                }
            })
            .collect();

        airlines.sort_by(|a, b| {
            b.total_unique_registrations
                .cmp(&a.total_unique_registrations)
                .then_with(|| a.airline_name.cmp(&b.airline_name))
        });

        Self {
            zone: None,
            airline_count: inventories.len(),
            total_aircraft: inventories
                .iter()
                .map(|i| i.total_unique_registrations)
                .sum(),
            distinct_types: all_types.len(),
            airlines,
        }
    }

    pub fn with_zone(mut self, zone: &str) -> Self {
        self.zone = Some(zone.to_string());
        self
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FleetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FLEET ANALYSIS")?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        if let Some(zone) = &self.zone {
            writeln!(f, "Zone: {zone}")?;
        }
        writeln!(f, "Airlines: {}", self.airline_count)?;
        writeln!(f, "Aircraft observed: {}", self.total_aircraft)?;
        writeln!(f, "Aircraft types: {}", self.distinct_types)?;

        for airline in &self.airlines {
            writeln!(f)?;
            writeln!(f, "{} ({})", airline.airline_name, airline.carrier_code)?;
            writeln!(f, "  Total: {} aircraft", airline.total_unique_registrations)?;
            writeln!(f, "  Types: {}", airline.type_count)?;
            for (type_key, count) in &airline.types {
                writeln!(f, "    - {type_key}: {count}")?;
            }
        }
        Ok(())
    }
}

/// An airline seen in both zones
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonAirline {
    pub carrier_code: String,
    pub airline_name: String,
    pub first_total: usize,
    pub second_total: usize,
}

/// Side-by-side totals for two collection runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneComparison {
    pub first_zone: String,
    pub second_zone: String,
    pub first_airlines: usize,
    pub second_airlines: usize,
    pub first_aircraft: usize,
    pub second_aircraft: usize,
    /// Ordered by carrier code
    pub common: Vec<CommonAirline>,
}

impl ZoneComparison {
    /// Compare two runs. Airlines are matched on carrier code; the name shown
    /// is the one from the first zone.
    pub fn compare(
        first_zone: &str,
        first: &[FinalizedInventory],
        second_zone: &str,
        second: &[FinalizedInventory],
    ) -> Self {
        let second_by_code: BTreeMap<&str, &FinalizedInventory> = second
            .iter()
            .map(|inventory| (inventory.carrier_code.as_str(), inventory))
            .collect();

        let mut common: Vec<CommonAirline> = first
            .iter()
            .filter_map(|inventory| {
                let other = second_by_code.get(inventory.carrier_code.as_str())?;
                Some(CommonAirline {
                    carrier_code: inventory.carrier_code.clone(),
                    airline_name: inventory.airline_name.clone(),
                    first_total: inventory.total_unique_registrations,
                    second_total: other.total_unique_registrations,
                })
            })
            .collect();
        common.sort_by(|a, b| a.carrier_code.cmp(&b.carrier_code));

        Self {
            first_zone: first_zone.to_string(),
            second_zone: second_zone.to_string(),
            first_airlines: first.len(),
            second_airlines: second.len(),
            first_aircraft: first.iter().map(|i| i.total_unique_registrations).sum(),
            second_aircraft: second.iter().map(|i| i.total_unique_registrations).sum(),
            common,
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ZoneComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "COMPARISON: {} vs {}", self.first_zone, self.second_zone)?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(f, "Airlines observed:")?;
        writeln!(f, "  {}: {}", self.first_zone, self.first_airlines)?;
        writeln!(f, "  {}: {}", self.second_zone, self.second_airlines)?;
        writeln!(f, "Unique aircraft observed:")?;
        writeln!(f, "  {}: {}", self.first_zone, self.first_aircraft)?;
        writeln!(f, "  {}: {}", self.second_zone, self.second_aircraft)?;
        writeln!(f, "Airlines in both zones: {}", self.common.len())?;
        for airline in &self.common {
            writeln!(
                f,
                "  - {}: {} vs {} aircraft",
                airline.airline_name, airline.first_total, airline.second_total
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::FleetCollection;
    use crate::sightings::Sighting;
    use chrono::{TimeZone, Utc};

    fn run(entries: &[(&str, &str, &str)]) -> Vec<FinalizedInventory> {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut fleets = FleetCollection::default();
        for (carrier, type_code, reg) in entries {
            fleets.ingest(
                &Sighting::new("1", at)
                    .with_carrier(carrier)
                    .with_type(type_code)
                    .with_registration(reg),
            );
        }
        fleets.finalize_all()
    }

    #[test]
    fn test_summary_orders_airlines_by_size() {
        let inventories = run(&[
            ("AFR", "A320", "F-GKXA"),
            ("RYR", "B738", "EI-DWA"),
            ("RYR", "B738", "EI-DWB"),
            ("RYR", "B38M", "EI-HEA"),
            ("RYR", "B738", ""),
        ]);

        let summary = FleetSummary::from_inventories(&inventories);
        assert_eq!(summary.airline_count, 2);
        assert_eq!(summary.total_aircraft, 4);
        assert_eq!(summary.distinct_types, 3);
        assert_eq!(summary.airlines[0].carrier_code, "RYR");
        assert_eq!(
            summary.airlines[0].types,
            vec![("B738".to_string(), 2), ("B38M".to_string(), 1)]
        );
    }

    #[test]
    fn test_summary_skips_empty_types() {
        let inventories = run(&[("EZY", "A319", "")]);
        let summary = FleetSummary::from_inventories(&inventories);
        assert_eq!(summary.airlines[0].type_count, 1);
        assert!(summary.airlines[0].types.is_empty());
    }

    #[test]
    fn test_render_contains_sections() {
        let inventories = run(&[("AFR", "A320", "F-GKXA"), ("AFR", "A321", "F-GTAK")]);
        let text = FleetSummary::from_inventories(&inventories)
            .with_zone("Europe")
            .render();

        assert!(text.contains("Zone: Europe"));
        assert!(text.contains("Air France (AFR)"));
        assert!(text.contains("  Total: 2 aircraft"));
        assert!(text.contains("    - A320: 1"));
    }

    #[test]
    fn test_zone_comparison() {
        let europe = run(&[
            ("AFR", "A320", "F-GKXA"),
            ("AFR", "A321", "F-GTAK"),
            ("DLH", "A359", "D-AIXA"),
        ]);
        let france = run(&[("AFR", "A320", "F-GKXA"), ("TVF", "B738", "F-GZHA")]);

        let comparison = ZoneComparison::compare("Europe", &europe, "France", &france);
        assert_eq!(comparison.first_airlines, 2);
        assert_eq!(comparison.second_aircraft, 2);
        assert_eq!(
            comparison.common,
            vec![CommonAirline {
                carrier_code: "AFR".to_string(),
                airline_name: "Air France".to_string(),
                first_total: 2,
                second_total: 1,
            }]
        );
        assert!(comparison.render().contains("Air France: 2 vs 1 aircraft"));
    }
}

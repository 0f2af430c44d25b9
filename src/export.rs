//! Flat tabular output for finalized inventories and reconciled sizes.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use crate::inventory::FinalizedInventory;
use crate::reconcile::ReconciledFleetSize;
use crate::registrations::RegistryPrefixes;

/// Registrations listed per fleet row unless configured otherwise
pub const DEFAULT_SAMPLE_REGISTRATIONS: usize = 5;

/// Aircraft type label for airlines with no typed sightings
pub const PLACEHOLDER_TYPE: &str = "N/A";

/// A row type with a fixed column list, so empty outputs still get a header.
pub trait Tabular: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// One (airline, aircraft type) line of the fleet report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetRow {
    pub airline_code: String,
    pub airline_name: String,
    pub aircraft_type: String,
    pub observed_count: usize,
    pub unique_registrations: usize,
    pub sample_registrations: String,
}

impl Tabular for FleetRow {
    const COLUMNS: &'static [&'static str] = &[
        "airline_code",
        "airline_name",
        "aircraft_type",
        "observed_count",
        "unique_registrations",
        "sample_registrations",
    ];
}

/// One registered aircraft
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AircraftRow {
    pub registration: String,
    pub airline_code: String,
    pub airline_name: String,
    pub aircraft_type: String,
    pub detailed_type: String,
    pub country: String,
}

impl Tabular for AircraftRow {
    const COLUMNS: &'static [&'static str] = &[
        "registration",
        "airline_code",
        "airline_name",
        "aircraft_type",
        "detailed_type",
        "country",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetSizeRow {
    pub airline: String,
    pub fleet_size: u32,
    pub fleet_size_known: bool,
}

impl Tabular for FleetSizeRow {
    const COLUMNS: &'static [&'static str] = &["airline", "fleet_size", "fleet_size_known"];
}

/// Fleet rows with the default number of sample registrations
pub fn export_rows(inventories: &[FinalizedInventory]) -> Vec<FleetRow> {
    export_rows_with_samples(inventories, DEFAULT_SAMPLE_REGISTRATIONS)
}

/// One row per airline and aircraft type, ordered by airline name, then by
/// carrier code, then by unique registrations (largest first), then by type. An airline with no
/// types at all still gets a single placeholder row.
pub fn export_rows_with_samples(
    inventories: &[FinalizedInventory],
    sample_limit: usize,
) -> Vec<FleetRow> {
    let mut rows = Vec::new();

    for inventory in inventories {
        if inventory.aircraft_types.is_empty() {
            rows.push(FleetRow {
                airline_code: inventory.carrier_code.clone(),
                airline_name: inventory.airline_name.clone(),
                aircraft_type: PLACEHOLDER_TYPE.to_string(),
                observed_count: 0,
                unique_registrations: 0,
                sample_registrations: String::new(),
            });
            continue;
        }

        for (type_key, bucket) in &inventory.aircraft_types {
            let sample: Vec<&str> = bucket
                .registrations
                .iter()
                .take(sample_limit)
                .map(String::as_str)
                .collect();
            rows.push(FleetRow {
                airline_code: inventory.carrier_code.clone(),
                airline_name: inventory.airline_name.clone(),
                aircraft_type: type_key.clone(),
                observed_count: bucket.observed_count,
                unique_registrations: bucket.unique_count,
                sample_registrations: sample.join(", "),
            });
        }
    }

    // Carriers can share a display name, so the code keeps each one's rows together
    rows.sort_by(|a, b| {
        a.airline_name
            .cmp(&b.airline_name)
            .then_with(|| a.airline_code.cmp(&b.airline_code))
            .then(b.unique_registrations.cmp(&a.unique_registrations))
            .then(a.aircraft_type.cmp(&b.aircraft_type))
    });
    rows
}

/// One row per registered aircraft with its country of registry, ordered by
/// airline name, carrier code, then registration.
pub fn export_aircraft_rows(
    inventories: &[FinalizedInventory],
    prefixes: &RegistryPrefixes,
) -> Vec<AircraftRow> {
    let mut rows: Vec<AircraftRow> = inventories
        .iter()
        .flat_map(|inventory| {
            inventory.aircraft.iter().map(move |aircraft| AircraftRow {
                registration: aircraft.registration.clone(),
                airline_code: inventory.carrier_code.clone(),
                airline_name: inventory.airline_name.clone(),
                aircraft_type: aircraft.aircraft_type.clone(),
                detailed_type: aircraft.detailed_type.clone(),
                country: prefixes.country_for(&aircraft.registration),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        a.airline_name
            .cmp(&b.airline_name)
            .then_with(|| a.airline_code.cmp(&b.airline_code))
            .then_with(|| a.registration.cmp(&b.registration))
    });
    rows
}

/// Write rows as CSV. The header is written even when `rows` is empty.
pub fn write_csv<T: Tabular, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    writer
        .write_record(T::COLUMNS)
        .with_context(|| format!("Failed to write header to {}", path.display()))?;
    for (index, row) in rows.iter().enumerate() {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row {} to {}", index + 1, path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write any serializable value as pretty-printed JSON
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote JSON to {}", path.display());
    Ok(())
}

/// Rows for a reconciled size list; unknown sizes are written as 0 with
/// `fleet_size_known = false`
pub fn fleet_size_rows(sizes: &[(String, ReconciledFleetSize)]) -> Vec<FleetSizeRow> {
    sizes
        .iter()
        .map(|(airline, size)| FleetSizeRow {
            airline: airline.clone(),
            fleet_size: size.export_value(),
            fleet_size_known: size.is_known(),
        })
        .collect()
}

pub fn write_fleet_sizes_csv<P: AsRef<Path>>(
    path: P,
    sizes: &[(String, ReconciledFleetSize)],
) -> Result<()> {
    write_csv(path, &fleet_size_rows(sizes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carriers::CarrierDirectory;
    use crate::inventory::FleetCollection;
    use crate::sightings::Sighting;
    use chrono::{TimeZone, Utc};

    fn sighting(carrier: &str, type_code: &str, reg: &str) -> Sighting {
        Sighting::new("1", Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
            .with_carrier(carrier)
            .with_type(type_code)
            .with_registration(reg)
    }

    fn sample_inventories() -> Vec<FinalizedInventory> {
        let mut fleets = FleetCollection::default();
        for s in [
            sighting("AFR", "A320", "F-GKXA"),
            sighting("AFR", "A320", "F-GKXA"),
            sighting("AFR", "A321", "F-GTAK"),
            sighting("AFR", "A321", "F-GTAL"),
            sighting("AMC", "A320", "9H-AEO"),
        ] {
            fleets.ingest(&s);
        }
        fleets.finalize_all()
    }

    #[test]
    fn test_rows_sorted_by_name_then_unique_desc() {
        let rows = export_rows(&sample_inventories());
        let keys: Vec<(&str, &str, usize)> = rows
            .iter()
            .map(|r| (r.airline_name.as_str(), r.aircraft_type.as_str(), r.unique_registrations))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Air France", "A321", 2),
                ("Air France", "A320", 1),
                ("Air Malta", "A320", 1),
            ]
        );
        assert_eq!(rows[0].sample_registrations, "F-GTAK, F-GTAL");
        assert_eq!(rows[1].observed_count, 2);
    }

    #[test]
    fn test_shared_display_name_keeps_carriers_apart() {
        let mut directory = CarrierDirectory::new();
        directory.insert("AF", "Air France");
        directory.insert("AFR", "Air France");

        let mut fleets = FleetCollection::new(directory);
        for s in [
            sighting("AFR", "A320", "F-GKXA"),
            sighting("AFR", "A320", "F-GKXB"),
            sighting("AF", "A321", "F-GTAK"),
            sighting("AFR", "B777", "F-GSQA"),
        ] {
            fleets.ingest(&s);
        }

        let rows = export_rows(&fleets.finalize_all());
        let keys: Vec<(&str, &str, usize)> = rows
            .iter()
            .map(|r| (r.airline_code.as_str(), r.aircraft_type.as_str(), r.unique_registrations))
            .collect();
        assert_eq!(
            keys,
            vec![("AF", "A321", 1), ("AFR", "A320", 2), ("AFR", "B777", 1)]
        );
    }

    #[test]
    fn test_placeholder_row_for_empty_inventory() {
        let empty = crate::inventory::FleetInventory::new("XYZ", "Carrier XYZ").finalize();
        let rows = export_rows(&[empty]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].aircraft_type, PLACEHOLDER_TYPE);
        assert_eq!(rows[0].observed_count, 0);
        assert_eq!(rows[0].unique_registrations, 0);
        assert_eq!(rows[0].sample_registrations, "");
    }

    #[test]
    fn test_sample_limit() {
        let mut fleets = FleetCollection::default();
        for reg in ["EI-DWA", "EI-DWB", "EI-DWC", "EI-DWD"] {
            fleets.ingest(&sighting("RYR", "B738", reg));
        }
        let rows = export_rows_with_samples(&fleets.finalize_all(), 2);
        assert_eq!(rows[0].sample_registrations, "EI-DWA, EI-DWB");
        assert_eq!(rows[0].unique_registrations, 4);
    }

    #[test]
    fn test_aircraft_rows_carry_country() {
        let mut prefixes = RegistryPrefixes::new();
        prefixes.insert("F", "France");
        prefixes.insert("9H", "Malta");

        let rows = export_aircraft_rows(&sample_inventories(), &prefixes);
        let regs: Vec<&str> = rows.iter().map(|r| r.registration.as_str()).collect();
        assert_eq!(regs, vec!["F-GKXA", "F-GTAK", "F-GTAL", "9H-AEO"]);
        assert_eq!(rows[0].country, "France");
        assert_eq!(rows[3].country, "Malta");
    }

    #[test]
    fn test_write_csv_header_on_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.csv");
        write_csv::<FleetRow, _>(&path, &[]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.trim_end(),
            "airline_code,airline_name,aircraft_type,observed_count,unique_registrations,sample_registrations"
        );
    }

    #[test]
    fn test_write_fleet_sizes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sizes.csv");
        let sizes = vec![
            ("Air Malta".to_string(), ReconciledFleetSize::Known(6)),
            ("Ghost Air".to_string(), ReconciledFleetSize::Unknown),
        ];
        write_fleet_sizes_csv(&path, &sizes).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "airline,fleet_size,fleet_size_known",
                "Air Malta,6,true",
                "Ghost Air,0,false"
            ]
        );
    }

    #[test]
    fn test_write_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.json");
        let inventories = sample_inventories();
        write_json(&path, &inventories).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let back: Vec<FinalizedInventory> = serde_json::from_str(&contents).unwrap();
        assert_eq!(back, inventories);
    }
}

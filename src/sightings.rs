//! Raw aircraft sightings and the file-replay loaders that produce them.
//!
//! Sightings come from an external polling collector. This module only knows
//! how to read what that collector left on disk: a flat CSV of sightings, a
//! JSON array of sightings, or a saved live-feed snapshot.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Minimum array length for a feed entry to be treated as a flight
const FEED_MIN_FIELDS: usize = 13;

// Positions inside a live-feed flight array
const FEED_AIRCRAFT_TYPE: usize = 8;
const FEED_REGISTRATION: usize = 9;
const FEED_TIMESTAMP: usize = 10;
const FEED_CALLSIGN: usize = 16;
const FEED_CARRIER_CODE: usize = 18;

/// One raw observation of an aircraft during a collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    /// Source-assigned id; reused across cycles, not globally unique
    pub flight_id: String,
    #[serde(default)]
    pub raw_carrier_code: String,
    #[serde(default)]
    pub callsign: String,
    #[serde(default)]
    pub aircraft_type_code: String,
    #[serde(default)]
    pub detailed_aircraft_type: String,
    /// Tail number; the only durable identity. May be empty.
    #[serde(default)]
    pub registration: String,
    pub observed_at: DateTime<Utc>,
}

impl Sighting {
    pub fn new(flight_id: &str, observed_at: DateTime<Utc>) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            raw_carrier_code: String::new(),
            callsign: String::new(),
            aircraft_type_code: String::new(),
            detailed_aircraft_type: String::new(),
            registration: String::new(),
            observed_at,
        }
    }

    pub fn with_carrier(mut self, code: &str) -> Self {
        self.raw_carrier_code = code.to_string();
        self
    }

    pub fn with_callsign(mut self, callsign: &str) -> Self {
        self.callsign = callsign.to_string();
        self
    }

    pub fn with_type(mut self, type_code: &str) -> Self {
        self.aircraft_type_code = type_code.to_string();
        self
    }

    pub fn with_detailed_type(mut self, detailed: &str) -> Self {
        self.detailed_aircraft_type = detailed.to_string();
        self
    }

    pub fn with_registration(mut self, registration: &str) -> Self {
        self.registration = registration.to_string();
        self
    }

    /// Registration with surrounding whitespace removed, or `None` if blank
    pub fn registration(&self) -> Option<&str> {
        let reg = self.registration.trim();
        if reg.is_empty() { None } else { Some(reg) }
    }
}

/// Read a CSV of sightings with a header row matching the field names.
/// Returns an error on the first malformed line.
pub fn read_sightings_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Sighting>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("Opening {:?}", path))?;

    let mut out = Vec::new();
    for (index, row) in reader.deserialize::<Sighting>().enumerate() {
        let sighting = row.with_context(|| format!("Parsing CSV line {}", index + 2))?;
        out.push(sighting);
    }

    info!("Read {} sightings from {:?}", out.len(), path);
    Ok(out)
}

/// Read sightings from JSON. Accepts either an array of sighting objects or a
/// saved live-feed snapshot (see [`parse_feed_json`]); `cycle_time` stamps feed
/// entries that carry no timestamp of their own.
pub fn read_sightings_json<P: AsRef<Path>>(path: P, cycle_time: DateTime<Utc>) -> Result<Vec<Sighting>> {
    let path = path.as_ref();
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

    let value: Value =
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;

    let out = match value {
        Value::Array(_) => serde_json::from_value::<Vec<Sighting>>(value)
            .with_context(|| format!("Failed to decode sightings in {:?}", path))?,
        Value::Object(_) => parse_feed_value(&value, cycle_time)?,
        _ => return Err(anyhow!("Expected a JSON array or object in {:?}", path)),
    };

    info!("Read {} sightings from {:?}", out.len(), path);
    Ok(out)
}

/// Read sightings from a `.csv` or `.json` file, chosen by extension
pub fn read_sightings<P: AsRef<Path>>(path: P, cycle_time: DateTime<Utc>) -> Result<Vec<Sighting>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    if extension.eq_ignore_ascii_case("csv") {
        read_sightings_csv(path)
    } else if extension.eq_ignore_ascii_case("json") {
        read_sightings_json(path, cycle_time)
    } else {
        Err(anyhow!("Unsupported sightings file {:?} (expected .csv or .json)", path))
    }
}

/// Parse a live-feed snapshot: a JSON object whose hex flight-id keys map to
/// flight arrays. Other keys (`full_count`, `version`, ...) and short arrays
/// are ignored.
pub fn parse_feed_json(json: &str, cycle_time: DateTime<Utc>) -> Result<Vec<Sighting>> {
    let value: Value = serde_json::from_str(json).context("Failed to parse feed snapshot")?;
    parse_feed_value(&value, cycle_time)
}

fn parse_feed_value(value: &Value, cycle_time: DateTime<Utc>) -> Result<Vec<Sighting>> {
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("Feed snapshot must be a JSON object"))?;

    let mut out = Vec::new();
    for (key, entry) in object {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        let Some(fields) = entry.as_array() else {
            continue;
        };
        if fields.len() < FEED_MIN_FIELDS {
            debug!("Skipping feed entry {} with {} fields", key, fields.len());
            continue;
        }

        let observed_at = fields
            .get(FEED_TIMESTAMP)
            .and_then(Value::as_i64)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(cycle_time);

        out.push(Sighting {
            flight_id: key.clone(),
            raw_carrier_code: feed_field(fields, FEED_CARRIER_CODE),
            callsign: feed_field(fields, FEED_CALLSIGN),
            aircraft_type_code: feed_field(fields, FEED_AIRCRAFT_TYPE),
            detailed_aircraft_type: String::new(),
            registration: feed_field(fields, FEED_REGISTRATION),
            observed_at,
        });
    }

    Ok(out)
}

/// String value at `index`, empty when missing or not a string/number
fn feed_field(fields: &[Value], index: usize) -> String {
    match fields.get(index) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

//! Carrier identity: resolving a carrier code from raw sighting fields and
//! mapping codes to display names.
//!
//! The name table is a lookup service rather than a compiled-in constant.
//! `CarrierDirectory::builtin()` ships the curated default (embedded from
//! `data/carriers.json`), and operators can layer their own JSON/TOML/CSV
//! table on top without touching the ingest code.

use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::normalize::normalize;

// Statically embed the curated carrier table into the binary
const CARRIERS_JSON: &str = include_str!("../data/carriers.json");

/// Leading run of 2-3 uppercase letters, e.g. "AFR" in "AFR1234"
static CALLSIGN_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]{2,3})").unwrap());

/// Resolve the carrier code for a sighting.
///
/// A non-empty raw carrier code always wins (returned trimmed). Otherwise the
/// carrier is taken from the leading uppercase letters of the callsign.
/// Returns `None` when neither source yields a code.
pub fn resolve_carrier_code(raw_carrier_code: &str, callsign: &str) -> Option<String> {
    let raw = raw_carrier_code.trim();
    if !raw.is_empty() {
        return Some(raw.to_string());
    }

    let callsign = callsign.trim();
    if callsign.is_empty() {
        return None;
    }

    CALLSIGN_PREFIX_RE
        .captures(callsign)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Anything that can turn a carrier code into a human-readable airline name.
pub trait CarrierLookup {
    /// Curated name for `code`, if known
    fn name_for(&self, code: &str) -> Option<&str>;

    /// Display name for `code`; unknown codes get a synthesized label
    fn display_name(&self, code: &str) -> String {
        match self.name_for(code) {
            Some(name) => name.to_string(),
            None => format!("Carrier {code}"),
        }
    }
}

impl CarrierLookup for HashMap<String, String> {
    fn name_for(&self, code: &str) -> Option<&str> {
        self.get(code).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierRecord {
    pub code: String,
    pub name: String,
}

/// TOML layout: a `[carriers]` table of `CODE = "Name"` pairs
#[derive(Debug, Deserialize)]
struct CarrierTableFile {
    #[serde(default)]
    carriers: HashMap<String, String>,
}

/// Code → name table used to label inventories.
#[derive(Debug, Clone, Default)]
pub struct CarrierDirectory {
    names: HashMap<String, String>,
}

impl CarrierDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The curated default table embedded in the binary
    pub fn builtin() -> Self {
        // The embedded file is validated by test_builtin_directory_parses
        let records: Vec<CarrierRecord> = serde_json::from_str(CARRIERS_JSON).unwrap_or_default();
        Self::from_records(records)
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = CarrierRecord>,
    {
        let mut directory = Self::new();
        for record in records {
            directory.insert(&record.code, &record.name);
        }
        directory
    }

    /// Load a carrier table from disk. The format follows the extension:
    /// `.json` (array of `{code, name}`), `.toml` (`[carriers]` table) or
    /// `.csv` (`code,name` header).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let directory = match extension.as_str() {
            "json" => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                let records: Vec<CarrierRecord> = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse {:?}", path))?;
                Self::from_records(records)
            }
            "toml" => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                let table: CarrierTableFile = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse {:?}", path))?;
                Self::from_records(
                    table
                        .carriers
                        .into_iter()
                        .map(|(code, name)| CarrierRecord { code, name }),
                )
            }
            "csv" => {
                let mut reader = csv::Reader::from_path(path)
                    .with_context(|| format!("Opening {:?}", path))?;
                let mut records = Vec::new();
                for (index, row) in reader.deserialize::<CarrierRecord>().enumerate() {
                    // +2: header line and 1-based numbering
                    let record = row.with_context(|| format!("Parsing CSV line {}", index + 2))?;
                    records.push(record);
                }
                Self::from_records(records)
            }
            other => {
                return Err(anyhow!(
                    "Unsupported carrier table format {:?} for {:?}",
                    other,
                    path
                ));
            }
        };

        info!("Loaded {} carrier names from {:?}", directory.len(), path);
        Ok(directory)
    }

    /// Add or replace one entry. Blank codes or names are ignored.
    pub fn insert(&mut self, code: &str, name: &str) {
        let code = code.trim();
        let name = name.trim();
        if code.is_empty() || name.is_empty() {
            debug!("Ignoring blank carrier entry {:?} => {:?}", code, name);
            return;
        }
        self.names.insert(code.to_string(), name.to_string());
    }

    /// Layer another table on top of this one; its entries win.
    pub fn extend(&mut self, other: CarrierDirectory) {
        self.names.extend(other.names);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl CarrierLookup for CarrierDirectory {
    fn name_for(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }
}

/// Canonical airline identity with its join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AirlineIdentity {
    pub canonical_name: String,
    pub code: Option<String>,
    pub normalized_name: String,
}

impl AirlineIdentity {
    pub fn new(canonical_name: &str, code: Option<&str>) -> Self {
        Self {
            canonical_name: canonical_name.to_string(),
            code: code.map(str::to_string),
            normalized_name: normalize(canonical_name),
        }
    }

    /// Identity for a carrier code, named through `lookup`
    pub fn for_code(code: &str, lookup: &dyn CarrierLookup) -> Self {
        Self::new(&lookup.display_name(code), Some(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_raw_code_wins_and_is_trimmed() {
        assert_eq!(resolve_carrier_code("  AFR ", "BAW123"), Some("AFR".to_string()));
    }

    #[test]
    fn test_resolve_from_callsign() {
        assert_eq!(resolve_carrier_code("", "AFR1234"), Some("AFR".to_string()));
        assert_eq!(resolve_carrier_code("   ", "EZY45KL"), Some("EZY".to_string()));
        // A single leading letter is not a carrier prefix
        assert_eq!(resolve_carrier_code("", "U21234"), None);
        assert_eq!(resolve_carrier_code("", "LH400"), Some("LH".to_string()));
        // Longest run is capped at three letters
        assert_eq!(resolve_carrier_code("", "ABCDE12"), Some("ABC".to_string()));
    }

    #[test]
    fn test_resolve_nothing() {
        assert_eq!(resolve_carrier_code("", ""), None);
        assert_eq!(resolve_carrier_code("", "1234"), None);
        assert_eq!(resolve_carrier_code("", "afr1234"), None);
        assert_eq!(resolve_carrier_code("", "A123"), None);
    }

    #[test]
    fn test_builtin_directory_parses() {
        let records: Vec<CarrierRecord> =
            serde_json::from_str(CARRIERS_JSON).expect("embedded carrier table must parse");
        assert_eq!(records.len(), 20);

        let directory = CarrierDirectory::builtin();
        assert_eq!(directory.len(), 20);
        assert_eq!(directory.display_name("AFR"), "Air France");
        assert_eq!(directory.display_name("CTN"), "Croatia Airlines");
    }

    #[test]
    fn test_unknown_code_gets_synthesized_label() {
        let directory = CarrierDirectory::builtin();
        assert_eq!(directory.display_name("XYZ"), "Carrier XYZ");
    }

    #[test]
    fn test_extend_overrides_entries() {
        let mut directory = CarrierDirectory::builtin();
        let mut overrides = CarrierDirectory::new();
        overrides.insert("AFR", "Air France-KLM");
        overrides.insert("WZZ", "Wizz Air");
        overrides.insert("", "ignored");
        directory.extend(overrides);

        assert_eq!(directory.display_name("AFR"), "Air France-KLM");
        assert_eq!(directory.display_name("WZZ"), "Wizz Air");
        assert_eq!(directory.len(), 21);
    }

    #[test]
    fn test_hashmap_lookup() {
        let table = HashMap::from([("VLG".to_string(), "Vueling".to_string())]);
        assert_eq!(table.display_name("VLG"), "Vueling");
        assert_eq!(table.display_name("IBE"), "Carrier IBE");
    }

    #[test]
    fn test_load_toml_and_csv_tables() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("carriers.toml");
        let mut f = std::fs::File::create(&toml_path).unwrap();
        writeln!(f, "[carriers]\nWZZ = \"Wizz Air\"\nTRA = \"Transavia\"").unwrap();
        let from_toml = CarrierDirectory::from_path(&toml_path).unwrap();
        assert_eq!(from_toml.display_name("TRA"), "Transavia");
        assert_eq!(from_toml.len(), 2);

        let csv_path = dir.path().join("carriers.csv");
        let mut f = std::fs::File::create(&csv_path).unwrap();
        writeln!(f, "code,name\nNAX,Norwegian Air Shuttle\nLOT,LOT Polish Airlines").unwrap();
        let from_csv = CarrierDirectory::from_path(&csv_path).unwrap();
        assert_eq!(from_csv.display_name("LOT"), "LOT Polish Airlines");

        let bad_path = dir.path().join("carriers.yaml");
        std::fs::write(&bad_path, "AFR: Air France").unwrap();
        assert!(CarrierDirectory::from_path(&bad_path).is_err());
    }

    #[test]
    fn test_airline_identity_normalized_name() {
        let directory = CarrierDirectory::builtin();
        let identity = AirlineIdentity::for_code("KLM", &directory);
        assert_eq!(identity.canonical_name, "KLM Royal Dutch Airlines");
        assert_eq!(identity.code.as_deref(), Some("KLM"));
        assert_eq!(identity.normalized_name, "klm royal dutch airlines");
        assert_eq!(normalize(&identity.normalized_name), identity.normalized_name);
    }
}

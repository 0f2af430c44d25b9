//! Registration (tail number) helpers: canonical spelling and country of
//! registry.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Longest registry prefix tried when matching a registration
const MAX_PREFIX_LEN: usize = 5;

/// Canonicalize a registration number using flydent so that "FGKXA",
/// "f-gkxa" and "F-GKXA" dedupe to one aircraft.
pub fn canonicalize_registration(registration: &str) -> String {
    let upper = registration.trim().to_uppercase();
    let parser = flydent::Parser::new();
    match parser.parse(&upper, false, false) {
        Some(r) => r.canonical_callsign().to_string(),
        // Unusual formats are kept as typed (upper-cased)
        None => upper,
    }
}

#[derive(Debug, Deserialize)]
struct PrefixRecord {
    prefix: String,
    country: String,
}

/// Registry prefix → country table (e.g. `F` → France, `EI` → Ireland).
///
/// Lookups try the longest prefix first and fall back to flydent's built-in
/// registry data when the table has no match.
#[derive(Debug, Clone, Default)]
pub struct RegistryPrefixes {
    countries: HashMap<String, String>,
}

impl RegistryPrefixes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `prefix,country` CSV table
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader =
            csv::Reader::from_path(path).with_context(|| format!("Opening {:?}", path))?;

        let mut table = Self::new();
        for (index, row) in reader.deserialize::<PrefixRecord>().enumerate() {
            let record = row.with_context(|| format!("Parsing CSV line {}", index + 2))?;
            table.insert(&record.prefix, &record.country);
        }

        info!("Loaded {} registry prefixes from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn insert(&mut self, prefix: &str, country: &str) {
        let prefix = prefix.trim().trim_matches('"').to_uppercase();
        if prefix.is_empty() {
            return;
        }
        self.countries
            .insert(prefix, country.trim().trim_matches('"').to_string());
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Country of registry for `registration`; empty when unknown
    pub fn country_for(&self, registration: &str) -> String {
        let reg = registration.trim().to_uppercase();
        if reg.is_empty() {
            return String::new();
        }

        let chars: Vec<char> = reg.chars().collect();
        for len in (1..=MAX_PREFIX_LEN.min(chars.len())).rev() {
            let prefix: String = chars[..len].iter().collect();
            if let Some(country) = self.countries.get(&prefix) {
                return country.clone();
            }
        }

        match flydent::Parser::new().parse(&reg, false, false) {
            Some(flydent::EntityResult::Country { nation, .. }) => nation,
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_ignores_case_and_padding() {
        assert_eq!(
            canonicalize_registration("  f-gkxa "),
            canonicalize_registration("F-GKXA")
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut table = RegistryPrefixes::new();
        table.insert("F", "France");
        table.insert("F-O", "French Overseas");
        table.insert("\"EI\"", "\"Ireland\"");

        assert_eq!(table.country_for("F-GKXA"), "France");
        assert_eq!(table.country_for("F-OHJA"), "French Overseas");
        assert_eq!(table.country_for("ei-dwf"), "Ireland");
        assert_eq!(table.country_for(""), "");
    }

    #[test]
    fn test_falls_back_to_registry_data() {
        let table = RegistryPrefixes::new();
        assert!(!table.country_for("D-AIBA").is_empty());
    }

    #[test]
    fn test_load_prefix_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefixes.csv");
        std::fs::write(&path, "prefix,country\nG,United Kingdom\n9H,Malta\n").unwrap();

        let table = RegistryPrefixes::from_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.country_for("9H-AEO"), "Malta");
        assert_eq!(table.country_for("G-EUUA"), "United Kingdom");
    }
}

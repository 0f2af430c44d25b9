use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::carriers::CarrierDirectory;
use crate::companies::FleetSizeBand;
use crate::export::DEFAULT_SAMPLE_REGISTRATIONS;
use crate::registrations::RegistryPrefixes;

/// Top-level configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Extra carrier names layered over the built-in table (.json/.toml/.csv)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carriers_file: Option<PathBuf>,
    /// `prefix,country` CSV used for country of registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_prefixes_file: Option<PathBuf>,
    #[serde(default = "default_sample_registrations")]
    pub sample_registrations: usize,
    #[serde(default)]
    pub canonicalize_registrations: bool,
    #[serde(default)]
    pub fleet_band: FleetSizeBand,
}

fn default_sample_registrations() -> usize {
    DEFAULT_SAMPLE_REGISTRATIONS
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            carriers_file: None,
            registry_prefixes_file: None,
            sample_registrations: default_sample_registrations(),
            canonicalize_registrations: false,
            fleet_band: FleetSizeBand::default(),
        }
    }
}

impl FleetConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: FleetConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        debug!("Loaded config from {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Save config to a TOML file (atomic: write to .tmp then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;
        Ok(())
    }

    /// Load `path` if given, otherwise the resolved default location when it
    /// exists, otherwise built-in defaults. An explicit path must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = config_path();
        if default_path.exists() {
            Self::load(&default_path)
        } else {
            debug!("No config at {:?}, using defaults", default_path);
            Ok(Self::default())
        }
    }

    /// Built-in carrier table with `carriers_file` layered on top
    pub fn carrier_directory(&self) -> Result<CarrierDirectory> {
        let mut directory = CarrierDirectory::builtin();
        if let Some(path) = &self.carriers_file {
            directory.extend(CarrierDirectory::from_path(path)?);
            info!("Using {} carrier names", directory.len());
        }
        Ok(directory)
    }

    /// Registry prefix table, empty (flydent fallback only) when unset
    pub fn registry_prefixes(&self) -> Result<RegistryPrefixes> {
        match &self.registry_prefixes_file {
            Some(path) => RegistryPrefixes::from_csv(path),
            None => Ok(RegistryPrefixes::new()),
        }
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `AIRFLEET_CONFIG` env var
/// 2. `./airfleet.toml`
pub fn config_path() -> PathBuf {
    match std::env::var("AIRFLEET_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("./airfleet.toml"),
    }
}

//! Observation deduplication: folds raw sightings into per-airline fleet
//! inventories keyed by registration.
//!
//! Repeated polling cycles see the same aircraft again and again. The only
//! durable identity is the registration, so each airline's inventory keeps a
//! registration set per aircraft type plus the union across types. A
//! registration lives in exactly one type bucket; when a later sighting files
//! it under another type the most recent label wins and the registration moves.
//!
//! Inventories can be finalized at any point, including mid-run, so a run that
//! stops early still produces valid counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, trace, warn};

use crate::carriers::{CarrierDirectory, CarrierLookup, resolve_carrier_code};
use crate::normalize::normalize;
use crate::registrations::canonicalize_registration;
use crate::sightings::Sighting;

/// Registrations seen for one aircraft type, plus the raw sighting count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeBucket {
    observed_count: usize,
    registrations: BTreeSet<String>,
}

impl TypeBucket {
    /// Accepted sightings for this type, duplicates and anonymous ones included
    pub fn observed_count(&self) -> usize {
        self.observed_count
    }

    pub fn registrations(&self) -> &BTreeSet<String> {
        &self.registrations
    }

    pub fn unique_count(&self) -> usize {
        self.registrations.len()
    }
}

/// Where a registration is currently filed
#[derive(Debug, Clone, PartialEq, Eq)]
struct Assignment {
    type_key: String,
    detailed_type: String,
    last_observed: DateTime<Utc>,
}

/// Mutable per-airline aggregate built up during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetInventory {
    carrier_code: String,
    airline_name: String,
    aircraft_types: BTreeMap<String, TypeBucket>,
    /// Registration → current bucket. Its key set is the union of all buckets.
    assignments: BTreeMap<String, Assignment>,
    sightings: usize,
}

impl FleetInventory {
    pub fn new(carrier_code: &str, airline_name: &str) -> Self {
        Self {
            carrier_code: carrier_code.to_string(),
            airline_name: airline_name.to_string(),
            aircraft_types: BTreeMap::new(),
            assignments: BTreeMap::new(),
            sightings: 0,
        }
    }

    pub fn carrier_code(&self) -> &str {
        &self.carrier_code
    }

    pub fn airline_name(&self) -> &str {
        &self.airline_name
    }

    pub fn aircraft_types(&self) -> &BTreeMap<String, TypeBucket> {
        &self.aircraft_types
    }

    pub fn bucket(&self, type_key: &str) -> Option<&TypeBucket> {
        self.aircraft_types.get(type_key)
    }

    /// Union of registrations across every type bucket
    pub fn all_registrations(&self) -> impl Iterator<Item = &str> {
        self.assignments.keys().map(String::as_str)
    }

    pub fn total_unique_registrations(&self) -> usize {
        self.assignments.len()
    }

    /// Type currently holding `registration`
    pub fn type_of(&self, registration: &str) -> Option<&str> {
        self.assignments
            .get(registration)
            .map(|a| a.type_key.as_str())
    }

    /// Record one accepted observation of `type_key`. Blank registrations only
    /// bump the raw count.
    pub fn record(
        &mut self,
        type_key: &str,
        registration: Option<&str>,
        detailed_type: &str,
        observed_at: DateTime<Utc>,
    ) {
        self.sightings += 1;
        self.aircraft_types
            .entry(type_key.to_string())
            .or_default()
            .observed_count += 1;

        let Some(registration) = registration else {
            return;
        };

        match self.assignments.get_mut(registration) {
            None => {
                self.file_under(type_key, registration);
                self.assignments.insert(
                    registration.to_string(),
                    Assignment {
                        type_key: type_key.to_string(),
                        detailed_type: detailed_type.to_string(),
                        last_observed: observed_at,
                    },
                );
            }
            Some(assignment) => {
                // Older sightings never override a newer label
                if observed_at < assignment.last_observed {
                    trace!(
                        "Ignoring stale label {} for {} (current {})",
                        type_key, registration, assignment.type_key
                    );
                    return;
                }

                let previous_type = std::mem::replace(&mut assignment.type_key, type_key.to_string());
                assignment.last_observed = observed_at;
                if !detailed_type.is_empty() {
                    assignment.detailed_type = detailed_type.to_string();
                }

                if previous_type != type_key {
                    debug!(
                        "{} {}: relabelled {} -> {}",
                        self.carrier_code, registration, previous_type, type_key
                    );
                    if let Some(bucket) = self.aircraft_types.get_mut(&previous_type) {
                        bucket.registrations.remove(registration);
                    }
                    self.file_under(type_key, registration);
                }
            }
        }
    }

    fn file_under(&mut self, type_key: &str, registration: &str) {
        self.aircraft_types
            .entry(type_key.to_string())
            .or_default()
            .registrations
            .insert(registration.to_string());
    }

    /// Snapshot the inventory with counts computed and sets turned into
    /// ordered sequences. Valid at any point of a run.
    pub fn finalize(&self) -> FinalizedInventory {
        let aircraft_types = self
            .aircraft_types
            .iter()
            .map(|(type_key, bucket)| {
                (
                    type_key.clone(),
                    FinalizedBucket {
                        observed_count: bucket.observed_count,
                        unique_count: bucket.registrations.len(),
                        registrations: bucket.registrations.iter().cloned().collect(),
                    },
                )
            })
            .collect();

        let aircraft = self
            .assignments
            .iter()
            .map(|(registration, a)| AircraftRecord {
                registration: registration.clone(),
                aircraft_type: a.type_key.clone(),
                detailed_type: a.detailed_type.clone(),
                last_observed: a.last_observed,
            })
            .collect();

        let finalized = FinalizedInventory {
            carrier_code: self.carrier_code.clone(),
            airline_name: self.airline_name.clone(),
            normalized_name: normalize(&self.airline_name),
            aircraft_types,
            all_registrations: self.assignments.keys().cloned().collect(),
            total_unique_registrations: self.assignments.len(),
            observed_sightings: self.sightings,
            aircraft,
        };

        debug_assert!(
            finalized.is_consistent(),
            "inventory for {} broke the union invariant",
            self.carrier_code
        );
        finalized
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedBucket {
    pub observed_count: usize,
    pub unique_count: usize,
    pub registrations: Vec<String>,
}

/// One registered aircraft with its current type label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftRecord {
    pub registration: String,
    pub aircraft_type: String,
    pub detailed_type: String,
    pub last_observed: DateTime<Utc>,
}

/// Frozen inventory ready for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedInventory {
    pub carrier_code: String,
    pub airline_name: String,
    pub normalized_name: String,
    pub aircraft_types: BTreeMap<String, FinalizedBucket>,
    pub all_registrations: Vec<String>,
    pub total_unique_registrations: usize,
    pub observed_sightings: usize,
    #[serde(default)]
    pub aircraft: Vec<AircraftRecord>,
}

impl FinalizedInventory {
    /// Recompute every derived count from the registration lists. Finalizing
    /// an already-finalized inventory returns an equal value.
    ///
    /// A registration listed under several types (a hand-edited file) is kept
    /// under the type its aircraft record names, else under the first type in
    /// key order, and dropped from the others.
    pub fn finalize(mut self) -> Self {
        let mut claims: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (type_key, bucket) in self.aircraft_types.iter_mut() {
            bucket.registrations.sort();
            bucket.registrations.dedup();
            for registration in &bucket.registrations {
                claims
                    .entry(registration.clone())
                    .or_default()
                    .push(type_key.clone());
            }
        }

        let labels: HashMap<&str, &str> = self
            .aircraft
            .iter()
            .map(|a| (a.registration.as_str(), a.aircraft_type.as_str()))
            .collect();
        for (registration, types) in claims.iter().filter(|(_, types)| types.len() > 1) {
            let keep = labels
                .get(registration.as_str())
                .copied()
                .filter(|label| types.iter().any(|t| t == label))
                .unwrap_or(types[0].as_str());
            warn!(
                "{} {}: listed under {}, keeping {}",
                self.carrier_code,
                registration,
                types.join(", "),
                keep
            );
            for type_key in types.iter().filter(|t| t.as_str() != keep) {
                if let Some(bucket) = self.aircraft_types.get_mut(type_key) {
                    bucket.registrations.retain(|r| r != registration);
                }
            }
        }

        let mut union = BTreeSet::new();
        for bucket in self.aircraft_types.values_mut() {
            bucket.unique_count = bucket.registrations.len();
            union.extend(bucket.registrations.iter().cloned());
        }
        self.all_registrations = union.into_iter().collect();
        self.total_unique_registrations = self.all_registrations.len();
        self.normalized_name = normalize(&self.airline_name);
        self
    }

    /// True when the union and per-bucket counts agree and no registration is
    /// filed under two types.
    pub fn is_consistent(&self) -> bool {
        let mut seen = BTreeSet::new();
        for bucket in self.aircraft_types.values() {
            if bucket.unique_count != bucket.registrations.len() {
                return false;
            }
            for registration in &bucket.registrations {
                if !seen.insert(registration.as_str()) {
                    return false;
                }
            }
        }

        let union: Vec<&str> = seen.into_iter().collect();
        let listed: Vec<&str> = self.all_registrations.iter().map(String::as_str).collect();
        union == listed && self.total_unique_registrations == self.all_registrations.len()
    }

    pub fn unique_count(&self, type_key: &str) -> usize {
        self.aircraft_types
            .get(type_key)
            .map(|b| b.unique_count)
            .unwrap_or(0)
    }
}

/// What happened to one sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Counted and its registration added to the inventory
    Accepted,
    /// Counted, but it carries no registration so it adds no aircraft
    Anonymous,
    /// No carrier code from either the raw code or the callsign
    SkippedNoCarrier,
    /// No aircraft type code
    SkippedNoType,
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::Accepted => write!(f, "accepted"),
            IngestOutcome::Anonymous => write!(f, "anonymous"),
            IngestOutcome::SkippedNoCarrier => write!(f, "skipped_no_carrier"),
            IngestOutcome::SkippedNoType => write!(f, "skipped_no_type"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: usize,
    pub anonymous: usize,
    pub skipped_no_carrier: usize,
    pub skipped_no_type: usize,
}

impl IngestStats {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Accepted => self.accepted += 1,
            IngestOutcome::Anonymous => self.anonymous += 1,
            IngestOutcome::SkippedNoCarrier => self.skipped_no_carrier += 1,
            IngestOutcome::SkippedNoType => self.skipped_no_type += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.accepted + self.anonymous + self.skipped_no_carrier + self.skipped_no_type
    }

    pub fn skipped(&self) -> usize {
        self.skipped_no_carrier + self.skipped_no_type
    }
}

/// All inventories of one run, keyed by carrier code. Owned exclusively by
/// the run; nothing here is shared across threads.
pub struct FleetCollection {
    lookup: Box<dyn CarrierLookup>,
    canonicalize_registrations: bool,
    inventories: BTreeMap<String, FleetInventory>,
    stats: IngestStats,
}

impl Default for FleetCollection {
    fn default() -> Self {
        Self::new(CarrierDirectory::builtin())
    }
}

impl FleetCollection {
    pub fn new(lookup: impl CarrierLookup + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
            canonicalize_registrations: false,
            inventories: BTreeMap::new(),
            stats: IngestStats::default(),
        }
    }

    /// Rewrite registrations to their canonical spelling before deduplication
    pub fn with_canonical_registrations(mut self, enabled: bool) -> Self {
        self.canonicalize_registrations = enabled;
        self
    }

    /// Fold one sighting into the collection. Sightings without a carrier or
    /// an aircraft type are skipped; that is not an error.
    pub fn ingest(&mut self, sighting: &Sighting) -> IngestOutcome {
        let outcome = self.ingest_inner(sighting);
        self.stats.record(outcome);
        metrics::counter!("fleet.sightings_total", "outcome" => outcome.to_string()).increment(1);
        outcome
    }

    fn ingest_inner(&mut self, sighting: &Sighting) -> IngestOutcome {
        let Some(carrier) = resolve_carrier_code(&sighting.raw_carrier_code, &sighting.callsign)
        else {
            trace!("Skipping flight {}: no carrier", sighting.flight_id);
            return IngestOutcome::SkippedNoCarrier;
        };

        let type_key = sighting.aircraft_type_code.trim();
        if type_key.is_empty() {
            trace!("Skipping flight {}: no aircraft type", sighting.flight_id);
            return IngestOutcome::SkippedNoType;
        }

        let registration = sighting.registration().map(|reg| {
            if self.canonicalize_registrations {
                canonicalize_registration(reg)
            } else {
                reg.to_string()
            }
        });

        let lookup = &self.lookup;
        let inventory = self
            .inventories
            .entry(carrier.clone())
            .or_insert_with(|| FleetInventory::new(&carrier, &lookup.display_name(&carrier)));

        inventory.record(
            type_key,
            registration.as_deref(),
            sighting.detailed_aircraft_type.trim(),
            sighting.observed_at,
        );

        if registration.is_some() {
            IngestOutcome::Accepted
        } else {
            IngestOutcome::Anonymous
        }
    }

    /// Ingest a batch and return the stats for that batch alone
    pub fn ingest_all<'a, I>(&mut self, sightings: I) -> IngestStats
    where
        I: IntoIterator<Item = &'a Sighting>,
    {
        let mut batch = IngestStats::default();
        for sighting in sightings {
            batch.record(self.ingest(sighting));
        }
        debug!(
            "Ingested batch: {} accepted, {} anonymous, {} skipped",
            batch.accepted,
            batch.anonymous,
            batch.skipped()
        );
        batch
    }

    /// Cumulative stats since the collection was created
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn inventory(&self, carrier_code: &str) -> Option<&FleetInventory> {
        self.inventories.get(carrier_code)
    }

    pub fn inventories(&self) -> impl Iterator<Item = &FleetInventory> {
        self.inventories.values()
    }

    pub fn len(&self) -> usize {
        self.inventories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inventories.is_empty()
    }

    /// Finalize every inventory, ordered by carrier code
    pub fn finalize_all(&self) -> Vec<FinalizedInventory> {
        self.inventories.values().map(FleetInventory::finalize).collect()
    }
}

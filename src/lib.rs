//! AIRFLEET - airline fleet inventory library
//!
//! Folds repeated aircraft sightings into per-airline fleet inventories keyed
//! by registration, reconciles fleet-size estimates from independent sources,
//! and exports flat tables for downstream tools.

pub mod carriers;
pub mod commands;
pub mod companies;
pub mod config;
pub mod export;
pub mod inventory;
pub mod normalize;
pub mod reconcile;
pub mod registrations;
pub mod sightings;
pub mod summary;

pub use carriers::{AirlineIdentity, CarrierDirectory, CarrierLookup, resolve_carrier_code};
pub use config::FleetConfig;
pub use inventory::{FinalizedInventory, FleetCollection, FleetInventory, IngestOutcome, IngestStats};
pub use normalize::normalize;
pub use reconcile::{FleetSizeEstimate, ReconciledFleetSize, ReconciledFleetSizes, reconcile};
pub use sightings::Sighting;

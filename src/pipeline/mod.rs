//! Pipeline entry points.
//!
//! - `run_harvest`: validate the window, open the configured source, harvest
//!   and export, then release the source

pub mod harvest;

pub use harvest::{HarvestOutcome, HarvestRequest, Harvester, harvest_into, run_harvest};

//! Service layer for the harvester.
//!
//! - Keyword exclusion for comments and item bodies (`ExclusionSet`)

mod filter;

pub use filter::ExclusionSet;

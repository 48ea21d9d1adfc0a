//! Shared data model for the policy lag-correlation crates: daily series,
//! jurisdictions, outcomes and the per-population normalization helpers.

pub mod errors;
pub mod normalize;
pub mod types;

pub use errors::SeriesError;
pub use types::{Jurisdiction, Observation, Outcome, TimeSeries};

//! Canonical data model for the roundlog pipeline.
//!
//! Defines samples (the raw producer stream), reconstructed rounds, historical
//! buckets and trend points, and the plain analytics records handed to the
//! presentation layer. All other crates depend on these types.

pub mod analytics;
pub mod bucket;
pub mod progression;
pub mod round;
pub mod sample;
pub mod sync;

//! Proptest strategies for roundlog property-based testing
//!
//! Reusable generators for samples, rounds and numeric series shared by the
//! segment, aggregate, stats and trend property tests.

pub mod strategies;

pub use strategies::{
    strategy_activity_history, strategy_datetime_utc, strategy_round, strategy_sample,
    strategy_sample_stream, strategy_trend_series,
};

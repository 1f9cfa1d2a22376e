//! Player and server statistics.
//!
//! Rates are computed from consecutive-sample deltas so that kill resets never
//! produce negative contributions. K/D and milestones work on finalized rounds.
//! [`BusyClassifier`] compares current activity with the same hour-of-week slot
//! in history.

mod busy;
mod milestones;
mod rates;

pub use busy::BusyClassifier;
pub use milestones::milestones;
pub use rates::{
    KillRateAccumulator, RoundTotals, kd_ratio, kill_rate_by_player, rate_summary, rates_by,
    round_totals,
};

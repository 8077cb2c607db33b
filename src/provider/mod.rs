pub mod calculator;

pub use calculator::{CALC_METHODS, SalahProvider};

use chrono::{NaiveDate, NaiveTime};

use crate::models::PrayerName;

/// Failure taxonomy for a time provider.
///
/// The engine reacts to all three the same way (keep the last-known-good
/// set, surface a load-failed flag); the split exists so callers can phrase
/// the problem and choose their own retry or fallback policy.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no prayer times available for {0}")]
    NoData(NaiveDate),
    #[error("malformed time value: {0}")]
    Malformed(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of a day's named time points, in chronological order.
///
/// Implementations do whatever I/O they need; the engine only ever sees the
/// returned values. The core never retries a failed call.
pub trait TimeProvider {
    fn times_for(&self, date: NaiveDate) -> Result<Vec<(PrayerName, NaiveTime)>, ProviderError>;
}

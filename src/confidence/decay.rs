//! Presentation-time confidence decay
//!
//! Computes the effective confidence of an already-persisted record from how
//! long ago it was last reinforced. Unlike the build-time model this variant
//! works on the full [0.0, 1.0] range and only applies a floor, so a stored
//! score passes through unchanged when the record is fresh.
//!
//! Formula: `effective = base - decay_rate * weeks_since_last_observed`.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Weekly decay rate (2% per week).
pub const DEFAULT_DECAY_RATE: f64 = 0.02;

/// Floor for decayed confidence.
pub const DECAY_FLOOR: f64 = 0.3;

/// Effective confidence after time-based decay.
///
/// `timestamp` is the record's `last_observed` (callers fall back to
/// `created` themselves). A missing or unparsable timestamp returns the base
/// confidence unchanged; staleness we cannot measure is not an error.
pub fn effective_confidence(base_confidence: f64, timestamp: Option<&str>, decay_rate: f64) -> f64 {
    let Some(timestamp) = timestamp.filter(|t| !t.is_empty()) else {
        return base_confidence;
    };

    let Some(elapsed_days) = elapsed_days_since(timestamp) else {
        return base_confidence;
    };

    let weeks_since = elapsed_days.max(0) as f64 / 7.0;
    (base_confidence - decay_rate * weeks_since).max(DECAY_FLOOR)
}

/// Whole days between `timestamp` and now, or `None` if it cannot be parsed.
///
/// A trailing `Z` and explicit offsets are honored as absolute times; a naive
/// timestamp is compared against local time in the same representation.
fn elapsed_days_since(timestamp: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Some((Utc::now() - parsed.with_timezone(&Utc)).num_days());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, format) {
            return Some((Local::now().naive_local() - naive).num_days());
        }
    }

    None
}

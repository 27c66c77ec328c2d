use crate::probe::EventRecord;

use super::extract;

/// Per-unit aggregate over a measured phase.
///
/// Division is floor division, matching the threshold semantics of the
/// regression gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateResult {
    /// Number of measured workload units.
    pub total_units: u64,
    /// Number of events that matched the filter.
    pub event_count: u64,
    /// Sum of per-event cost contributions.
    pub sum: u64,
    /// `sum / total_units`, floored.
    pub per_unit: u64,
    /// `event_count / total_units`, floored.
    pub events_per_unit: u64,
}

/// Reduces an already-filtered record sequence into per-unit aggregates.
///
/// Deterministic for a fixed snapshot and unit count. `total_units` must be
/// positive; the scenario config validates that before any workload runs.
pub fn reduce<'a>(
    records: impl Iterator<Item = &'a EventRecord>,
    total_units: u64,
) -> AggregateResult {
    debug_assert!(total_units > 0, "measured unit count must be positive");

    let mut event_count = 0u64;
    let mut sum = 0u64;
    for record in records {
        event_count += 1;
        sum += extract::cost(record);
    }

    AggregateResult {
        total_units,
        event_count,
        sum,
        per_unit: sum / total_units,
        events_per_unit: event_count / total_units,
    }
}

//! Per-kind metric extraction.
//!
//! Each event kind contributes a different payload field to the cost metric:
//! buffer size for in-buffer allocations, raw size for outside-buffer
//! allocations, and bytes transferred for each socket direction. The tagged
//! payload enum makes the selection a total match, so there is no
//! unknown-kind failure path at runtime.

use crate::probe::EventRecord;

/// Returns the record's contribution to the cost metric.
pub fn cost(record: &EventRecord) -> u64 {
    record.payload.quantity()
}

/// Sums the contributions of an already-filtered record sequence.
pub fn total_cost<'a>(records: impl Iterator<Item = &'a EventRecord>) -> u64 {
    records.map(cost).sum()
}

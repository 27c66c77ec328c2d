use std::sync::atomic::{AtomicU64, Ordering};

use super::event::{EventKind, MAX_EVENT_KIND};

/// Lock-free per-EventKind capture counters.
///
/// `captured` counts records appended to the buffer; `suppressed` counts
/// records dropped at the source because the kind was disabled, capture was
/// gated off, or the quantitative field fell below the source threshold.
pub struct CaptureStats {
    captured: [AtomicU64; MAX_EVENT_KIND + 1],
    suppressed: [AtomicU64; MAX_EVENT_KIND + 1],
}

impl CaptureStats {
    /// Create a new zeroed CaptureStats.
    pub fn new() -> Self {
        Self {
            captured: std::array::from_fn(|_| AtomicU64::new(0)),
            suppressed: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Record one captured event of the given kind.
    pub fn record_captured(&self, kind: EventKind) {
        if let Some(counter) = self.captured.get(kind as usize) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one source-suppressed event of the given kind.
    pub fn record_suppressed(&self, kind: EventKind) {
        if let Some(counter) = self.suppressed.get(kind as usize) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Atomically read and reset all counters, returning only non-zero
    /// entries as `(kind, captured, suppressed)`.
    pub fn snapshot(&self) -> Vec<(EventKind, u64, u64)> {
        let mut result = Vec::new();

        for i in 1..=MAX_EVENT_KIND {
            let captured = self.captured[i].swap(0, Ordering::Relaxed);
            let suppressed = self.suppressed[i].swap(0, Ordering::Relaxed);
            if captured > 0 || suppressed > 0 {
                if let Some(kind) = EventKind::from_u8(i as u8) {
                    result.push((kind, captured, suppressed));
                }
            }
        }

        result
    }
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}

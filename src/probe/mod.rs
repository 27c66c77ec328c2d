//! Runtime event capture: typed event records, the append-only event
//! channel with its flush barrier, and per-kind capture statistics.

pub mod channel;
pub mod event;
pub mod stats;

pub use channel::{EventChannel, EventPublisher, SourceState, StackPolicy};
pub use event::{EventKind, EventPayload, EventRecord, MAX_EVENT_KIND};

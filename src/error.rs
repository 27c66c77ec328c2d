use thiserror::Error;

/// Error taxonomy for a measurement session.
///
/// Every variant is fatal to the current phase: partial state (a partially
/// warmed workload, a partially drained buffer) cannot be resumed, so callers
/// re-run the whole session. A failed regression gate is NOT an error; it is
/// reported as a normal verdict.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A source spec or scenario config is invalid. Surfaced before any
    /// workload runs.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Another session currently holds the event channel. Source
    /// configuration is channel-global, so sessions are exclusive.
    #[error("another capture session is already active on this channel")]
    SessionActive,

    /// The event sink is gone and the flush barrier cannot complete. No
    /// partial metric is reported: an inconsistent event count would silently
    /// corrupt every downstream metric.
    #[error("event source unavailable: {0}")]
    SourceUnavailable(String),

    /// A unit of work returned an unexpected result. This means the system
    /// under test is broken, not the harness.
    #[error("workload unit {unit} failed: {detail}")]
    Workload { unit: u64, detail: String },
}

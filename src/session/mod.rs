//! Session-scoped event source configuration.
//!
//! Source configuration is channel-global mutable state, so it is modeled as
//! an exclusive handle: `configure` atomically claims the channel, and the
//! claim (plus every enabled source) is released when the session drops.

use std::collections::HashSet;

use tracing::info;

use crate::error::HarnessError;
use crate::probe::{EventChannel, EventKind, SourceState, StackPolicy};

/// Configuration for one event source within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpec {
    /// Event kind to enable.
    pub kind: EventKind,
    /// Minimum quantitative value captured; values below it are suppressed
    /// at the source. 0 captures everything. Validated non-negative.
    pub threshold: i64,
    /// Stack capture policy handed to the backend.
    pub stack_policy: StackPolicy,
}

impl SourceSpec {
    /// A spec that captures every event of `kind` with no stack traces.
    pub fn unfiltered(kind: EventKind) -> Self {
        Self {
            kind,
            threshold: 0,
            stack_policy: StackPolicy::Omitted,
        }
    }
}

/// Exclusive handle over a configured capture session.
pub struct Session {
    channel: EventChannel,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Enables the named sources and disables every other kind, claiming the
    /// channel for this session.
    ///
    /// Fails with `Configuration` on an empty spec list, a negative
    /// threshold, or a duplicated kind, and with `SessionActive` if another
    /// session holds the channel. Validation runs before the claim so a
    /// rejected configure leaves the channel untouched.
    pub fn configure(channel: &EventChannel, specs: &[SourceSpec]) -> Result<Self, HarnessError> {
        if specs.is_empty() {
            return Err(HarnessError::Configuration(
                "at least one event source must be enabled".into(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in specs {
            if spec.threshold < 0 {
                return Err(HarnessError::Configuration(format!(
                    "threshold for {} must be >= 0, got {}",
                    spec.kind, spec.threshold,
                )));
            }
            if !seen.insert(spec.kind) {
                return Err(HarnessError::Configuration(format!(
                    "event source {} appears more than once",
                    spec.kind,
                )));
            }
        }

        if !channel.try_claim() {
            return Err(HarnessError::SessionActive);
        }

        channel.disable_all();
        channel.set_capture_enabled(true);
        for spec in specs {
            channel.enable_source(
                spec.kind,
                SourceState {
                    threshold: spec.threshold as u64,
                    stack_policy: spec.stack_policy,
                },
            );
        }

        info!(sources = specs.len(), "capture session configured");

        Ok(Self {
            channel: channel.clone(),
        })
    }

    /// The underlying channel.
    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Gates capture off without dropping source configuration, e.g. during
    /// warm-up.
    pub fn pause_capture(&self) {
        self.channel.set_capture_enabled(false);
    }

    /// Re-enables capture after `pause_capture`.
    pub fn resume_capture(&self) {
        self.channel.set_capture_enabled(true);
    }

    /// Flush barrier; see [`EventChannel::flush`].
    pub async fn flush(&self) -> Result<(), HarnessError> {
        self.channel.flush().await
    }

    /// Discards buffered events and starts a new epoch; see
    /// [`EventChannel::reset`].
    pub async fn reset(&self) -> Result<(), HarnessError> {
        self.channel.reset().await
    }

    /// Stable copy of the buffered events in capture order.
    pub fn snapshot(&self) -> Vec<crate::probe::EventRecord> {
        self.channel.snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.channel.disable_all();
        self.channel.set_capture_enabled(true);
        self.channel.release_claim();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::EventPayload;

    #[tokio::test]
    async fn test_configure_enables_named_and_disables_others() {
        let channel = EventChannel::new();
        let session = Session::configure(
            &channel,
            &[SourceSpec {
                kind: EventKind::SocketRead,
                threshold: 100,
                stack_policy: StackPolicy::Captured,
            }],
        )
        .expect("configure");

        let state = channel
            .source_state(EventKind::SocketRead)
            .expect("read source enabled");
        assert_eq!(state.threshold, 100);
        assert_eq!(state.stack_policy, StackPolicy::Captured);
        assert!(channel.source_state(EventKind::SocketWrite).is_none());
        assert!(channel.source_state(EventKind::AllocInBuffer).is_none());

        drop(session);
        assert!(channel.source_state(EventKind::SocketRead).is_none());
    }

    #[tokio::test]
    async fn test_configure_rejects_negative_threshold() {
        let channel = EventChannel::new();
        let err = Session::configure(
            &channel,
            &[SourceSpec {
                kind: EventKind::SocketRead,
                threshold: -1,
                stack_policy: StackPolicy::Omitted,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        // A rejected configure must not leave a claim behind.
        assert!(channel.try_claim());
    }

    #[tokio::test]
    async fn test_configure_rejects_duplicate_kind() {
        let channel = EventChannel::new();
        let err = Session::configure(
            &channel,
            &[
                SourceSpec::unfiltered(EventKind::SocketRead),
                SourceSpec::unfiltered(EventKind::SocketRead),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_configure_rejects_empty_specs() {
        let channel = EventChannel::new();
        let err = Session::configure(&channel, &[]).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_sessions_are_exclusive_until_drop() {
        let channel = EventChannel::new();
        let specs = [SourceSpec::unfiltered(EventKind::AllocInBuffer)];

        let first = Session::configure(&channel, &specs).expect("first session");
        let err = Session::configure(&channel, &specs).unwrap_err();
        assert!(matches!(err, HarnessError::SessionActive));

        drop(first);
        Session::configure(&channel, &specs).expect("second session after drop");
    }

    #[tokio::test]
    async fn test_pause_and_resume_capture() {
        let channel = EventChannel::new();
        let session = Session::configure(
            &channel,
            &[SourceSpec::unfiltered(EventKind::AllocOutsideBuffer)],
        )
        .expect("configure");
        let publisher = channel.publisher();

        session.pause_capture();
        publisher.emit(EventPayload::AllocOutsideBuffer {
            allocation_size: 512,
        });
        session.resume_capture();
        publisher.emit(EventPayload::AllocOutsideBuffer {
            allocation_size: 1024,
        });

        session.flush().await.expect("flush");
        let snapshot = session.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].payload.quantity(), 1024);
    }
}

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HarnessError;

use super::event::{EventKind, EventPayload, EventRecord, MAX_EVENT_KIND};
use super::stats::CaptureStats;

/// Stack capture policy for an enabled event source.
///
/// Consumed by the capture backend; correlation never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackPolicy {
    /// Do not capture stack traces (default).
    #[default]
    Omitted,
    /// Capture a stack trace with each event.
    Captured,
}

impl StackPolicy {
    /// Returns the canonical config label name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Omitted => "omitted",
            Self::Captured => "captured",
        }
    }

    /// Convert from the canonical config label name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "omitted" => Some(Self::Omitted),
            "captured" => Some(Self::Captured),
            _ => None,
        }
    }
}

impl fmt::Display for StackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind source configuration, read on every emission.
#[derive(Debug, Clone, Copy)]
pub struct SourceState {
    /// Events whose quantitative field is below this value are suppressed at
    /// the source. 0 captures everything.
    pub threshold: u64,
    /// Stack capture policy handed to the backend.
    pub stack_policy: StackPolicy,
}

enum Envelope {
    Record(EventRecord),
    Barrier(oneshot::Sender<()>),
}

struct ChannelInner {
    origin: Instant,
    tx: mpsc::UnboundedSender<Envelope>,
    buffer: RwLock<Vec<EventRecord>>,
    sources: RwLock<[Option<SourceState>; MAX_EVENT_KIND + 1]>,
    capture_enabled: AtomicBool,
    session_claimed: AtomicBool,
    stats: CaptureStats,
}

/// Append-only event log with a flush barrier.
///
/// Producers publish records through a cloneable [`EventPublisher`] from any
/// thread; a single drain task appends them to the buffer in arrival order.
/// Because the queue is FIFO, a barrier token enqueued by `flush()` is
/// dequeued only after every record published before the call, which is the
/// happens-before edge the measurement protocol relies on: events emitted by
/// completed workload operations are visible once `flush()` returns, while
/// events from operations still in flight belong to the next epoch.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
    cancel: CancellationToken,
}

impl EventChannel {
    /// Creates the channel and spawns its drain task on the current runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ChannelInner {
            origin: Instant::now(),
            tx,
            buffer: RwLock::new(Vec::new()),
            sources: RwLock::new([None; MAX_EVENT_KIND + 1]),
            capture_enabled: AtomicBool::new(true),
            session_claimed: AtomicBool::new(false),
            stats: CaptureStats::new(),
        });

        let cancel = CancellationToken::new();
        let drain_inner = Arc::clone(&inner);
        let drain_cancel = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = drain_cancel.cancelled() => {
                        debug!("event drain task stopped");
                        break;
                    }
                    msg = rx.recv() => match msg {
                        Some(Envelope::Record(record)) => {
                            drain_inner.buffer.write().push(record);
                        }
                        Some(Envelope::Barrier(ack)) => {
                            let _ = ack.send(());
                        }
                        None => break,
                    }
                }
            }
        });

        Self { inner, cancel }
    }

    /// Returns a cloneable publisher handle for producer threads.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Enables one event kind with the given threshold and stack policy.
    pub fn enable_source(&self, kind: EventKind, state: SourceState) {
        self.inner.sources.write()[kind as usize] = Some(state);
        debug!(
            kind = %kind,
            threshold = state.threshold,
            stack = %state.stack_policy,
            "event source enabled",
        );
    }

    /// Disables one event kind.
    pub fn disable_source(&self, kind: EventKind) {
        self.inner.sources.write()[kind as usize] = None;
    }

    /// Disables every event kind.
    pub fn disable_all(&self) {
        *self.inner.sources.write() = [None; MAX_EVENT_KIND + 1];
    }

    /// Returns the current configuration for a kind, if enabled.
    pub fn source_state(&self, kind: EventKind) -> Option<SourceState> {
        self.inner.sources.read()[kind as usize]
    }

    /// Gates capture on or off for all sources at once.
    ///
    /// Used to keep the warm-up phase from growing the buffer without
    /// tearing down the per-source configuration.
    pub fn set_capture_enabled(&self, enabled: bool) {
        self.inner.capture_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Blocks until every event published before this call is visible in the
    /// buffer. Non-destructive and idempotent.
    pub async fn flush(&self) -> Result<(), HarnessError> {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.inner
            .tx
            .send(Envelope::Barrier(ack_tx))
            .map_err(|_| HarnessError::SourceUnavailable("event sink is closed".into()))?;

        ack_rx
            .await
            .map_err(|_| HarnessError::SourceUnavailable("event drain task stopped".into()))
    }

    /// Discards all buffered events and starts a new capture epoch.
    ///
    /// Runs a flush barrier first so that events already in flight from the
    /// previous epoch are drained and discarded rather than leaking into the
    /// new one.
    pub async fn reset(&self) -> Result<(), HarnessError> {
        self.flush().await?;
        let discarded = {
            let mut buffer = self.inner.buffer.write();
            let n = buffer.len();
            buffer.clear();
            n
        };
        debug!(discarded, "event buffer reset");
        Ok(())
    }

    /// Returns a stable copy of the current buffer contents, in capture
    /// order. Call after `flush()` for a complete epoch; filter passes borrow
    /// the returned snapshot without further copying.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.inner.buffer.read().clone()
    }

    /// Number of records currently buffered.
    pub fn len(&self) -> usize {
        self.inner.buffer.read().len()
    }

    /// True if no records are buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.buffer.read().is_empty()
    }

    /// Capture statistics (captured/suppressed per kind, reset on read).
    pub fn stats(&self) -> &CaptureStats {
        &self.inner.stats
    }

    /// Stops the drain task. Subsequent `flush()` calls fail with
    /// `SourceUnavailable`.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Atomically claims the channel for a session. Returns false if another
    /// session already holds it.
    pub(crate) fn try_claim(&self) -> bool {
        self.inner
            .session_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the session claim.
    pub(crate) fn release_claim(&self) {
        self.inner.session_claimed.store(false, Ordering::Release);
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static THREAD_NAME: Arc<str> =
        Arc::from(std::thread::current().name().unwrap_or("unnamed"));
}

/// Cloneable producer handle.
///
/// `emit` is synchronous and non-blocking so service worker threads can
/// publish without touching the async runtime.
#[derive(Clone)]
pub struct EventPublisher {
    inner: Arc<ChannelInner>,
}

impl EventPublisher {
    /// Publishes one event, applying the source table: disabled kinds, gated
    /// capture, and quantities below the source threshold are suppressed
    /// before they reach the buffer.
    pub fn emit(&self, payload: EventPayload) {
        let kind = payload.kind();

        if !self.inner.capture_enabled.load(Ordering::Relaxed) {
            self.inner.stats.record_suppressed(kind);
            return;
        }

        let state = match self.inner.sources.read()[kind as usize] {
            Some(state) => state,
            None => {
                self.inner.stats.record_suppressed(kind);
                return;
            }
        };

        if payload.quantity() < state.threshold {
            self.inner.stats.record_suppressed(kind);
            return;
        }

        let record = EventRecord {
            timestamp_ns: self.inner.origin.elapsed().as_nanos() as u64,
            thread: THREAD_NAME.with(Arc::clone),
            payload,
        };

        if self.inner.tx.send(Envelope::Record(record)).is_ok() {
            self.inner.stats.record_captured(kind);
        } else {
            self.inner.stats.record_suppressed(kind);
        }
    }
}

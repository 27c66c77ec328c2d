//! In-process simulated workload.
//!
//! Emulates a service handling one request per unit on named worker threads
//! that publish runtime events through the capture channel. Each unit's
//! events are published before its completion is acknowledged, giving the
//! same causal ordering a real instrumented service provides. Backs the
//! binary's `simulated` mode and the scenario tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::HarnessError;
use crate::probe::{EventPayload, EventPublisher};

use super::Workload;

/// One request/response exchange against the simulated downstream
/// dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketRoundTrip {
    /// Bytes written to the dependency.
    pub request_bytes: u64,
    /// Bytes read back from the dependency.
    pub response_bytes: u64,
}

/// What one simulated unit of work emits.
#[derive(Debug, Clone, Default)]
pub struct SimProfile {
    /// In-buffer allocation events per unit, one per listed buffer size.
    pub alloc_buffer_sizes: Vec<u64>,
    /// Outside-buffer allocation events per unit, one per listed size.
    pub alloc_outside_sizes: Vec<u64>,
    /// Socket round trips per unit against `remote_port`; each emits one
    /// write then one read.
    pub socket_round_trips: Vec<SocketRoundTrip>,
    /// Remote port for all socket events.
    pub remote_port: u16,
}

struct Job {
    unit_id: u64,
    done: oneshot::Sender<()>,
}

/// Simulated workload backed by named worker threads.
pub struct SimWorkload {
    senders: Vec<mpsc::UnboundedSender<Job>>,
    next: AtomicUsize,
}

impl SimWorkload {
    /// Spawns `workers` named worker threads publishing through `publisher`.
    pub fn spawn(publisher: EventPublisher, profile: SimProfile, workers: usize) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);

        for i in 0..workers {
            let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
            let publisher = publisher.clone();
            let profile = profile.clone();

            std::thread::Builder::new()
                .name(format!("unit-worker-{i}"))
                .spawn(move || {
                    while let Some(job) = rx.blocking_recv() {
                        handle_unit(&publisher, &profile, job.unit_id);
                        let _ = job.done.send(());
                    }
                    debug!(worker = i, "sim worker stopped");
                })
                .expect("spawning sim worker thread");

            senders.push(tx);
        }

        Self {
            senders,
            next: AtomicUsize::new(0),
        }
    }
}

fn handle_unit(publisher: &EventPublisher, profile: &SimProfile, _unit_id: u64) {
    for &size in &profile.alloc_buffer_sizes {
        publisher.emit(EventPayload::AllocInBuffer {
            allocation_size: size,
            buffer_size: size,
        });
    }

    for &size in &profile.alloc_outside_sizes {
        publisher.emit(EventPayload::AllocOutsideBuffer {
            allocation_size: size,
        });
    }

    for round_trip in &profile.socket_round_trips {
        publisher.emit(EventPayload::SocketWrite {
            remote_port: profile.remote_port,
            bytes_written: round_trip.request_bytes,
        });
        publisher.emit(EventPayload::SocketRead {
            remote_port: profile.remote_port,
            bytes_read: round_trip.response_bytes,
        });
    }
}

impl Workload for SimWorkload {
    async fn run_unit(&self, unit_id: u64) -> Result<(), HarnessError> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        let (done_tx, done_rx) = oneshot::channel();

        self.senders[idx]
            .send(Job {
                unit_id,
                done: done_tx,
            })
            .map_err(|_| HarnessError::Workload {
                unit: unit_id,
                detail: "simulated worker stopped".into(),
            })?;

        done_rx.await.map_err(|_| HarnessError::Workload {
            unit: unit_id,
            detail: "simulated worker dropped the unit".into(),
        })
    }
}

use crate::probe::{EventKind, EventRecord};

/// A single boolean test over an event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Kind equals the given kind.
    Kind(EventKind),
    /// Kind is a member of the given set. Combines related sources, e.g.
    /// both socket directions into one logical database-I/O stream.
    AnyKind(Vec<EventKind>),
    /// Producing thread name starts with any of the given prefixes.
    ThreadPrefix(Vec<String>),
    /// Socket payload with the given remote port. Non-socket records never
    /// match.
    RemotePort(u16),
}

impl Predicate {
    /// Evaluates this predicate against a record.
    pub fn matches(&self, record: &EventRecord) -> bool {
        match self {
            Self::Kind(kind) => record.kind() == *kind,
            Self::AnyKind(kinds) => kinds.contains(&record.kind()),
            Self::ThreadPrefix(prefixes) => prefixes
                .iter()
                .any(|prefix| record.thread.starts_with(prefix.as_str())),
            Self::RemotePort(port) => record.payload.remote_port() == Some(*port),
        }
    }
}

/// Conjunction of predicates over a buffer snapshot.
///
/// Filtering streams over the snapshot: chaining more predicates narrows the
/// same single pass instead of materializing intermediate copies, and
/// repeated passes over one snapshot yield identical sequences in identical
/// order.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    predicates: Vec<Predicate>,
}

impl EventFilter {
    /// An empty filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires kind equality.
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.predicates.push(Predicate::Kind(kind));
        self
    }

    /// Requires kind membership in the given set.
    pub fn any_kind(mut self, kinds: impl Into<Vec<EventKind>>) -> Self {
        self.predicates.push(Predicate::AnyKind(kinds.into()));
        self
    }

    /// Requires the producing thread name to start with `prefix`.
    pub fn thread_prefix(self, prefix: impl Into<String>) -> Self {
        self.thread_prefixes(vec![prefix.into()])
    }

    /// Requires the producing thread name to start with any of `prefixes`.
    pub fn thread_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.predicates.push(Predicate::ThreadPrefix(prefixes));
        self
    }

    /// Requires a socket payload with the given remote port.
    pub fn remote_port(mut self, port: u16) -> Self {
        self.predicates.push(Predicate::RemotePort(port));
        self
    }

    /// True if every predicate matches the record.
    pub fn matches(&self, record: &EventRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Lazy, restartable, order-preserving pass over a snapshot.
    pub fn iter<'a>(
        &'a self,
        snapshot: &'a [EventRecord],
    ) -> impl Iterator<Item = &'a EventRecord> + 'a {
        snapshot.iter().filter(move |record| self.matches(record))
    }

    /// Number of matching records in the snapshot.
    pub fn count(&self, snapshot: &[EventRecord]) -> u64 {
        self.iter(snapshot).count() as u64
    }
}

/// Filter matching both allocation kinds.
pub fn allocation_events() -> EventFilter {
    EventFilter::new().any_kind(vec![EventKind::AllocInBuffer, EventKind::AllocOutsideBuffer])
}

/// Filter matching both socket directions against one remote port,
/// isolating a single downstream dependency's traffic.
pub fn socket_events_for_port(port: u16) -> EventFilter {
    EventFilter::new()
        .any_kind(vec![EventKind::SocketRead, EventKind::SocketWrite])
        .remote_port(port)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::probe::EventPayload;

    fn record(thread: &str, payload: EventPayload) -> EventRecord {
        EventRecord {
            timestamp_ns: 0,
            thread: Arc::from(thread),
            payload,
        }
    }

    fn sample_snapshot() -> Vec<EventRecord> {
        vec![
            record(
                "unit-worker-0",
                EventPayload::AllocInBuffer {
                    allocation_size: 24,
                    buffer_size: 8192,
                },
            ),
            record(
                "unit-worker-1",
                EventPayload::SocketRead {
                    remote_port: 5432,
                    bytes_read: 230,
                },
            ),
            record(
                "background-sweeper",
                EventPayload::SocketWrite {
                    remote_port: 5432,
                    bytes_written: 87,
                },
            ),
            record(
                "unit-worker-0",
                EventPayload::SocketWrite {
                    remote_port: 8081,
                    bytes_written: 512,
                },
            ),
        ]
    }

    #[test]
    fn test_kind_predicate() {
        let snapshot = sample_snapshot();
        let filter = EventFilter::new().kind(EventKind::SocketRead);
        assert_eq!(filter.count(&snapshot), 1);
    }

    #[test]
    fn test_any_kind_predicate() {
        let snapshot = sample_snapshot();
        let filter =
            EventFilter::new().any_kind(vec![EventKind::SocketRead, EventKind::SocketWrite]);
        assert_eq!(filter.count(&snapshot), 3);
    }

    #[test]
    fn test_thread_prefix_any_of() {
        let snapshot = sample_snapshot();
        let filter = EventFilter::new()
            .thread_prefixes(vec!["unit-worker".into(), "background-".into()]);
        assert_eq!(filter.count(&snapshot), 4);

        let filter = EventFilter::new().thread_prefix("unit-worker");
        assert_eq!(filter.count(&snapshot), 3);
    }

    #[test]
    fn test_remote_port_ignores_non_socket_records() {
        let snapshot = sample_snapshot();
        let filter = EventFilter::new().remote_port(5432);
        let matched: Vec<_> = filter.iter(&snapshot).collect();
        assert_eq!(matched.len(), 2);
        assert!(matched
            .iter()
            .all(|r| r.payload.remote_port() == Some(5432)));
    }

    #[test]
    fn test_three_predicates_chain_conjunctively() {
        let snapshot = sample_snapshot();
        let filter = EventFilter::new()
            .any_kind(vec![EventKind::SocketRead, EventKind::SocketWrite])
            .thread_prefix("unit-worker")
            .remote_port(5432);
        let matched: Vec<_> = filter.iter(&snapshot).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].payload.quantity(), 230);
    }

    #[test]
    fn test_filtering_is_idempotent_and_order_preserving() {
        let snapshot = sample_snapshot();
        let filter = socket_events_for_port(5432);

        let first: Vec<u64> = filter.iter(&snapshot).map(|r| r.payload.quantity()).collect();
        let second: Vec<u64> = filter.iter(&snapshot).map(|r| r.payload.quantity()).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec![230, 87]);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let snapshot = sample_snapshot();
        assert_eq!(EventFilter::new().count(&snapshot), snapshot.len() as u64);
    }

    #[test]
    fn test_allocation_events_helper() {
        let snapshot = sample_snapshot();
        let filter = allocation_events();
        let matched: Vec<_> = filter.iter(&snapshot).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].kind(), EventKind::AllocInBuffer);
    }
}

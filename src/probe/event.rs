use std::fmt;
use std::sync::Arc;

/// EventKind identifies the kind of runtime event a source can emit.
///
/// The numeric values are stable and used for source-table indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    /// Allocation satisfied inside a thread-local allocation buffer.
    AllocInBuffer = 1,
    /// Allocation that bypassed the thread-local buffer.
    AllocOutsideBuffer = 2,
    /// Bytes read from a socket.
    SocketRead = 3,
    /// Bytes written to a socket.
    SocketWrite = 4,
}

/// Maximum EventKind value, used for array sizing.
pub const MAX_EVENT_KIND: usize = 4;

impl EventKind {
    /// Returns the canonical config/log label name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllocInBuffer => "alloc_in_buffer",
            Self::AllocOutsideBuffer => "alloc_outside_buffer",
            Self::SocketRead => "socket_read",
            Self::SocketWrite => "socket_write",
        }
    }

    /// Convert from a raw u8 value.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::AllocInBuffer),
            2 => Some(Self::AllocOutsideBuffer),
            3 => Some(Self::SocketRead),
            4 => Some(Self::SocketWrite),
            _ => None,
        }
    }

    /// Convert from the canonical config/log label name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alloc_in_buffer" => Some(Self::AllocInBuffer),
            "alloc_outside_buffer" => Some(Self::AllocOutsideBuffer),
            "socket_read" => Some(Self::SocketRead),
            "socket_write" => Some(Self::SocketWrite),
            _ => None,
        }
    }

    /// Return all event kinds in numeric order.
    pub fn all() -> &'static [Self] {
        &[
            Self::AllocInBuffer,
            Self::AllocOutsideBuffer,
            Self::SocketRead,
            Self::SocketWrite,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed event payload variants.
///
/// One variant per event kind, each carrying its own fields, so downstream
/// field selection is a total match instead of a by-name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload {
    /// Allocation served from a thread-local buffer. The buffer size is the
    /// cost attributed to the event, matching how buffer-backed allocators
    /// account for retired buffers rather than individual objects.
    AllocInBuffer {
        allocation_size: u64,
        buffer_size: u64,
    },
    /// Allocation outside any thread-local buffer; cost is the raw size.
    AllocOutsideBuffer { allocation_size: u64 },
    /// Socket read completion.
    SocketRead { remote_port: u16, bytes_read: u64 },
    /// Socket write completion.
    SocketWrite { remote_port: u16, bytes_written: u64 },
}

impl EventPayload {
    /// Returns the kind tag for this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::AllocInBuffer { .. } => EventKind::AllocInBuffer,
            Self::AllocOutsideBuffer { .. } => EventKind::AllocOutsideBuffer,
            Self::SocketRead { .. } => EventKind::SocketRead,
            Self::SocketWrite { .. } => EventKind::SocketWrite,
        }
    }

    /// Returns the quantitative field used for source-side threshold
    /// suppression. This is the same field the metric extractor selects.
    pub const fn quantity(&self) -> u64 {
        match self {
            Self::AllocInBuffer { buffer_size, .. } => *buffer_size,
            Self::AllocOutsideBuffer { allocation_size } => *allocation_size,
            Self::SocketRead { bytes_read, .. } => *bytes_read,
            Self::SocketWrite { bytes_written, .. } => *bytes_written,
        }
    }

    /// Returns the remote port for socket payloads, None otherwise.
    pub const fn remote_port(&self) -> Option<u16> {
        match self {
            Self::SocketRead { remote_port, .. } | Self::SocketWrite { remote_port, .. } => {
                Some(*remote_port)
            }
            _ => None,
        }
    }
}

/// A captured event occurrence.
///
/// Immutable once captured; discarded when the channel buffer is reset.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Monotonic capture time in nanoseconds since the channel epoch.
    pub timestamp_ns: u64,
    /// Name of the thread that produced the event.
    pub thread: Arc<str>,
    /// Typed event payload.
    pub payload: EventPayload,
}

impl EventRecord {
    /// Returns the kind of this record.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

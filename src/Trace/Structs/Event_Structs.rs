// The single record shape carried by the trace pipeline

/// Kind byte written at the start of every record.
///
/// The discriminants are part of the on-disk format.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Enter = 1,
    Exit = 2,
}

impl EventKind {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(EventKind::Enter),
            2 => Some(EventKind::Exit),
            _ => None,
        }
    }
}

/// A monotonic clock reading, laid out like a `timespec`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: i64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { secs: 0, nanos: 0 };

    pub fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }

    /// Total nanoseconds, saturating on overflow.
    pub fn as_nanos(&self) -> u64 {
        (self.secs.max(0) as u64)
            .saturating_mul(1_000_000_000)
            .saturating_add(self.nanos.max(0) as u64)
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            secs: (nanos / 1_000_000_000) as i64,
            nanos: (nanos % 1_000_000_000) as i64,
        }
    }
}

/// One function entry or exit, as captured by the instrumentation layer.
///
/// `function_id` and `caller_id` are opaque address-sized values; only the
/// low `pointer_width` bytes survive encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceEvent {
    pub kind: EventKind,
    pub timestamp: Timestamp,
    pub function_id: usize,
    pub caller_id: usize,
}

impl TraceEvent {
    pub fn enter(timestamp: Timestamp, function_id: usize, caller_id: usize) -> Self {
        Self {
            kind: EventKind::Enter,
            timestamp,
            function_id,
            caller_id,
        }
    }

    pub fn exit(timestamp: Timestamp, function_id: usize, caller_id: usize) -> Self {
        Self {
            kind: EventKind::Exit,
            timestamp,
            function_id,
            caller_id,
        }
    }
}

use std::io;
use thiserror::Error;

/// Errors surfaced by the recorder, the buffer pool and the trace reader.
///
/// Sink write failures during a flush are deliberately absent: they are
/// counted and reported by the writer instead of being returned to the
/// instrumented call site.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("invalid sink descriptor: {0}")]
    InvalidDescriptor(i32),

    #[error("maximum record size must be greater than zero")]
    InvalidRecordSize,

    #[error("cannot store an empty record")]
    EmptyRecord,

    #[error("record too large ({len} > {max})")]
    RecordTooLarge { len: usize, max: usize },

    #[error("unsupported pointer width: {0} (expected 4 or 8)")]
    UnsupportedPointerWidth(u8),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("recorder has been shut down")]
    Closed,

    #[error("a process-wide recorder is already installed")]
    AlreadyInstalled,

    #[error("no process-wide recorder is installed")]
    NotInstalled,

    #[error("truncated trace data: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("unknown event kind byte: {0}")]
    UnknownEventKind(u8),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TraceError>;

impl From<TraceError> for io::Error {
    fn from(e: TraceError) -> Self {
        match e {
            TraceError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

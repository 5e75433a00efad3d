// Fixed-width binary encoding of trace events.
//
// Record layout (all integers little-endian):
//
// +------+-----------+-----------+----------------+----------------+
// | kind | secs (i64)| nanos(i64)| function (pw B)| caller (pw B)  |
// +------+-----------+-----------+----------------+----------------+
//   1 B      8 B         8 B         pw bytes         pw bytes
//
// `pw` is the session pointer width recorded in the file header.

use crate::error::{Result, TraceError};
use crate::Trace::Structs::{EventKind, Timestamp, TraceEvent};

/// Bytes used by the timestamp field (seconds + nanoseconds).
pub const TIMESTAMP_WIDTH: usize = 16;

/// Widest pointer the format can carry.
pub const MAX_POINTER_WIDTH: usize = 8;

/// Largest record any supported pointer width can produce.
pub const MAX_RECORD_SIZE: usize = 1 + TIMESTAMP_WIDTH + 2 * MAX_POINTER_WIDTH;

/// Pointer width of the running process.
pub fn native_pointer_width() -> u8 {
    std::mem::size_of::<usize>() as u8
}

/// Accepts the pointer widths the format supports.
pub fn validate_pointer_width(pointer_width: u8) -> Result<u8> {
    match pointer_width {
        4 | 8 => Ok(pointer_width),
        other => Err(TraceError::UnsupportedPointerWidth(other)),
    }
}

/// Encoded length of one record for the given pointer width.
#[inline]
pub const fn record_size(pointer_width: u8) -> usize {
    1 + TIMESTAMP_WIDTH + 2 * pointer_width as usize
}

/// A record encoded on the stack. Never allocates.
#[derive(Copy, Clone)]
pub struct EncodedRecord {
    bytes: [u8; MAX_RECORD_SIZE],
    len: usize,
}

impl EncodedRecord {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for EncodedRecord {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for EncodedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedRecord")
            .field("len", &self.len)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

/// Encode `event` with a session pointer width of `pointer_width` bytes.
///
/// The width must already have passed [`validate_pointer_width`].
#[inline]
pub fn encode(event: &TraceEvent, pointer_width: u8) -> EncodedRecord {
    debug_assert!(validate_pointer_width(pointer_width).is_ok());
    let pw = pointer_width as usize;
    let mut bytes = [0u8; MAX_RECORD_SIZE];

    bytes[0] = event.kind.as_byte();
    bytes[1..9].copy_from_slice(&event.timestamp.secs.to_le_bytes());
    bytes[9..17].copy_from_slice(&event.timestamp.nanos.to_le_bytes());

    let fn_off = 1 + TIMESTAMP_WIDTH;
    bytes[fn_off..fn_off + pw].copy_from_slice(&(event.function_id as u64).to_le_bytes()[..pw]);
    let caller_off = fn_off + pw;
    bytes[caller_off..caller_off + pw]
        .copy_from_slice(&(event.caller_id as u64).to_le_bytes()[..pw]);

    EncodedRecord {
        bytes,
        len: record_size(pointer_width),
    }
}

/// Decode one record from the front of `bytes`.
pub fn decode(bytes: &[u8], pointer_width: u8) -> Result<TraceEvent> {
    let pointer_width = validate_pointer_width(pointer_width)?;
    let pw = pointer_width as usize;
    let expected = record_size(pointer_width);
    if bytes.len() < expected {
        return Err(TraceError::Truncated {
            expected,
            found: bytes.len(),
        });
    }

    let kind = EventKind::from_byte(bytes[0]).ok_or(TraceError::UnknownEventKind(bytes[0]))?;
    let secs = i64::from_le_bytes(read_array(&bytes[1..9]));
    let nanos = i64::from_le_bytes(read_array(&bytes[9..17]));

    let fn_off = 1 + TIMESTAMP_WIDTH;
    let function_id = read_address(&bytes[fn_off..fn_off + pw]);
    let caller_id = read_address(&bytes[fn_off + pw..fn_off + 2 * pw]);

    Ok(TraceEvent {
        kind,
        timestamp: Timestamp::new(secs, nanos),
        function_id,
        caller_id,
    })
}

#[inline]
fn read_array(src: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(src);
    out
}

#[inline]
fn read_address(src: &[u8]) -> usize {
    let mut out = [0u8; 8];
    out[..src.len()].copy_from_slice(src);
    u64::from_le_bytes(out) as usize
}

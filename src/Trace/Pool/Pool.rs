// The rotating pool of trace buffers shared by every instrumented thread.

use super::layout::{BufferEntry, PoolGeometry};
use crate::Core::writer::SequentialWriter;

use crossbeam_utils::CachePadded;
use std::alloc::Layout;
use std::io::Write;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize};

/// A fixed set of equal-size buffers, each split into fixed-size slots.
///
/// ### Concurrency Design:
/// - **Producers** read `active`, claim a slot with a fetch-add on that
///   buffer's `reserved` counter, copy their record in and bump `completed`.
/// - The producer whose increment completes the last slot drains the buffer
///   through the [`SequentialWriter`] and marks it ready for reuse.
/// - The producer that receives exactly `slot_count` from the reservation
///   counter rotates `active` to the next buffer, once that buffer is ready.
///
/// The storage is allocated once at construction and never reallocated.
pub struct TraceBufferPool<W: Write> {
    /// Sizes fixed at initialisation.
    pub(crate) geometry: PoolGeometry,

    /// One control block per buffer.
    pub(crate) entries: Box<[BufferEntry]>,

    /// Start of the zeroed backing storage for all buffers.
    pub(crate) storage: NonNull<u8>,

    /// Layout used to allocate (and free) `storage`.
    pub(crate) storage_layout: Layout,

    /// Index of the buffer new reservations target.
    pub(crate) active: CachePadded<AtomicUsize>,

    /// Set by teardown; no further records are accepted afterwards.
    pub(crate) closed: AtomicBool,

    pub(crate) writer: SequentialWriter<W>,
}

unsafe impl<W: Write + Send> Send for TraceBufferPool<W> {}
unsafe impl<W: Write + Send> Sync for TraceBufferPool<W> {}

/// Snapshot of pool activity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub flushes: u64,
    pub records_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
}

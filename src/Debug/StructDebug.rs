use std::fmt;
use std::io::Write;
use crate::Core::clock::Clock;
use crate::Trace::Pool::layout::BufferEntry;
use crate::Trace::Pool::TraceBufferPool;
use crate::Trace::TraceRecorder;

/// Debug function for TraceBufferPool
///
/// Shows geometry, the active buffer and counters without touching slot
/// contents, which may be mid-write.
pub fn debug_trace_buffer_pool<W: Write + Send>(pool: &TraceBufferPool<W>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TraceBufferPool")
        .field("storage", &format_args!("{:p}", pool.storage.as_ptr()))
        .field("geometry", pool.geometry())
        .field("active", &pool.active_index())
        .field("closed", &pool.is_closed())
        .field("flushing", &pool.writer.is_flushing())
        .field("buffers", &pool.entries)
        .field("stats", &pool.stats())
        .finish()
}

/// Debug function for BufferEntry
pub fn debug_buffer_entry(entry: &BufferEntry, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BufferEntry")
        .field("reserved", &entry.reserved_count())
        .field("completed", &entry.completed_count())
        .field("ready", &entry.is_ready())
        .finish()
}

/// Debug function for TraceRecorder
pub fn debug_trace_recorder<W: Write + Send, C: Clock>(recorder: &TraceRecorder<W, C>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TraceRecorder")
        .field("pointer_width", &recorder.pointer_width())
        .field("pool", recorder.pool())
        .field("clock", &"<opaque>")
        .finish_non_exhaustive()
}

impl<W: Write + Send> fmt::Debug for TraceBufferPool<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_trace_buffer_pool(self, f)
    }
}

impl fmt::Debug for BufferEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_buffer_entry(self, f)
    }
}

impl<W: Write + Send, C: Clock> fmt::Debug for TraceRecorder<W, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_trace_recorder(self, f)
    }
}

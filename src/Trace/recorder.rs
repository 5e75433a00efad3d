use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{info, warn};

use super::encoder::{self, record_size, validate_pointer_width};
use super::Pool::{layout::CACHE_SIZE, layout::NUMBER_OF_CACHES, PoolStats, TraceBufferPool};
use super::Structs::{EventKind, Timestamp, TraceEvent};
use crate::error::Result;
use crate::Core::clock::{Clock, MonotonicClock};

thread_local! {
    // Last clock reading seen on this thread; stands in when the clock fails.
    static LAST_TIMESTAMP: Cell<Timestamp> = const { Cell::new(Timestamp::ZERO) };
}

/// Recorder counters, including those of the underlying pool.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub flushes: u64,
    pub records_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub clock_failures: u64,
}

/// Event intake for one trace session.
///
/// Constructed once (writing the pointer-width header), shared by reference
/// with every call site, and torn down with [`TraceRecorder::deinit`].
pub struct TraceRecorder<W: Write + Send, C: Clock = MonotonicClock> {
    pub(crate) pool: TraceBufferPool<W>,
    pub(crate) clock: C,
    pub(crate) pointer_width: u8,
    pub(crate) clock_failures: AtomicU64,
    pub(crate) clock_error_reported: AtomicBool,
}

impl<W: Write + Send> TraceRecorder<W, MonotonicClock> {
    /// Start a session on `sink` with the default pool sizing and the
    /// native pointer width.
    pub fn init(sink: W) -> Result<Self> {
        Self::with_clock(
            sink,
            MonotonicClock,
            NUMBER_OF_CACHES,
            CACHE_SIZE,
            encoder::native_pointer_width(),
        )
    }
}

impl<W: Write + Send, C: Clock> TraceRecorder<W, C> {
    pub fn with_clock(
        sink: W,
        clock: C,
        buffer_count: usize,
        buffer_size: usize,
        pointer_width: u8,
    ) -> Result<Self> {
        let pointer_width = validate_pointer_width(pointer_width)?;
        let pool = TraceBufferPool::new(sink, buffer_count, buffer_size, record_size(pointer_width))?;
        pool.write_header(pointer_width)?;

        info!(
            pointer_width,
            buffers = buffer_count,
            slots = pool.geometry().slot_count,
            "trace session started"
        );

        Ok(Self {
            pool,
            clock,
            pointer_width,
            clock_failures: AtomicU64::new(0),
            clock_error_reported: AtomicBool::new(false),
        })
    }

    /// Record a function entry. Failures are swallowed; see [`Self::record`].
    #[inline]
    pub fn on_enter(&self, function_id: usize, caller_id: usize) {
        let _ = self.record(EventKind::Enter, function_id, caller_id);
    }

    /// Record a function exit. Failures are swallowed; see [`Self::record`].
    #[inline]
    pub fn on_exit(&self, function_id: usize, caller_id: usize) {
        let _ = self.record(EventKind::Exit, function_id, caller_id);
    }

    /// Timestamp, encode and store one event.
    ///
    /// Only fails with `TraceError::Closed` once the session is over.
    #[inline]
    pub fn record(&self, kind: EventKind, function_id: usize, caller_id: usize) -> Result<()> {
        let event = TraceEvent {
            kind,
            timestamp: self.timestamp(),
            function_id,
            caller_id,
        };
        self.record_event(&event)
    }

    /// Encode and store an already timestamped event.
    #[inline]
    pub fn record_event(&self, event: &TraceEvent) -> Result<()> {
        let encoded = encoder::encode(event, self.pointer_width);
        self.pool.reserve_and_store(encoded.as_bytes())
    }

    /// Read the clock, falling back to this thread's last good reading.
    fn timestamp(&self) -> Timestamp {
        match self.clock.now() {
            Ok(ts) => {
                LAST_TIMESTAMP.with(|last| last.set(ts));
                ts
            }
            Err(e) => {
                self.clock_failures.fetch_add(1, Ordering::Relaxed);
                if !self.clock_error_reported.swap(true, Ordering::AcqRel) {
                    warn!(error = %e, "clock read failed; using last known timestamp");
                }
                LAST_TIMESTAMP.with(|last| last.get())
            }
        }
    }

    /// End the session: drain partially filled buffers and refuse further
    /// events. Idempotent.
    pub fn deinit(&self) -> RecorderStats {
        self.pool.flush_partial();
        self.stats()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn pointer_width(&self) -> u8 {
        self.pointer_width
    }

    pub fn pool(&self) -> &TraceBufferPool<W> {
        &self.pool
    }

    pub fn stats(&self) -> RecorderStats {
        let PoolStats {
            flushes,
            records_written,
            bytes_written,
            write_errors,
        } = self.pool.stats();
        RecorderStats {
            flushes,
            records_written,
            bytes_written,
            write_errors,
            clock_failures: self.clock_failures.load(Ordering::Relaxed),
        }
    }
}

impl<W: Write + Send, C: Clock> Drop for TraceRecorder<W, C> {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            self.pool.flush_partial();
        }
    }
}

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::io::{self, Write};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering::{AcqRel, Acquire, Relaxed, Release}};

use crossbeam_utils::{Backoff, CachePadded};
use tracing::{debug, info};

use super::layout::{BufferEntry, PoolGeometry, BUFFER_ALIGN, SLOT_LEN_PREFIX};
use super::Pool::{PoolStats, TraceBufferPool};
use crate::error::{Result, TraceError};
use crate::Core::writer::SequentialWriter;

impl<W: Write + Send> TraceBufferPool<W> {
    /// Allocate `buffer_count` zeroed buffers whose slot count is derived
    /// from `cache_size` and `max_record_size`, draining into `sink`.
    ///
    /// Buffer 0 starts active; every other buffer starts empty and ready.
    pub fn new(sink: W, buffer_count: usize, cache_size: usize, max_record_size: usize) -> Result<Self> {
        let geometry = PoolGeometry::new(buffer_count, cache_size, max_record_size)?;

        let storage_layout = Layout::from_size_align(geometry.total_bytes(), BUFFER_ALIGN)
            .map_err(|e| TraceError::InvalidConfig(format!("pool layout: {e}")))?;
        let storage = NonNull::new(unsafe { alloc_zeroed(storage_layout) }).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("Failed to allocate {} bytes of trace buffers", geometry.total_bytes()),
            )
        })?;

        let entries: Box<[BufferEntry]> = (0..buffer_count)
            .map(|i| BufferEntry::new(i != 0))
            .collect();

        debug!(
            buffers = geometry.buffer_count,
            slots = geometry.slot_count,
            slot_stride = geometry.slot_stride,
            "trace buffer pool initialised"
        );

        Ok(Self {
            geometry,
            entries,
            storage,
            storage_layout,
            active: CachePadded::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            writer: SequentialWriter::new(sink),
        })
    }

    /// Store one record, blocking only while the pool waits for a buffer to
    /// be drained.
    ///
    /// Fails only for contract violations: an empty record, a record larger
    /// than the slot payload, or a pool that has been torn down.
    pub fn reserve_and_store(&self, record: &[u8]) -> Result<()> {
        if record.is_empty() {
            return Err(TraceError::EmptyRecord);
        }
        if record.len() > self.geometry.max_record_size {
            return Err(TraceError::RecordTooLarge {
                len: record.len(),
                max: self.geometry.max_record_size,
            });
        }
        if self.closed.load(Relaxed) {
            return Err(TraceError::Closed);
        }

        let slot_count = self.geometry.slot_count;
        let backoff = Backoff::new();

        loop {
            let current = self.active.load(Acquire);
            let entry = &self.entries[current];
            let slot = entry.reserve();

            if slot < slot_count {
                // We own `slot` exclusively until the buffer is drained.
                unsafe { self.write_slot(current, slot, record) };
                if entry.complete() == slot_count {
                    self.drain_full(current);
                }
                return Ok(());
            } else if slot == slot_count {
                // Exactly one reservation per fill cycle lands here.
                self.advance_active(current);
            } else {
                // Someone else is rotating; re-read `active`.
                backoff.snooze();
            }
        }
    }

    /// Move `active` from `current` to the next buffer in round-robin order,
    /// waiting until that buffer has been drained.
    ///
    /// `active` is published before the buffer's counter is reset; until the
    /// reset, reservations against `next` still overshoot and retry.
    fn advance_active(&self, current: usize) {
        let next = self.geometry.next_buffer(current);
        let entry = &self.entries[next];

        entry.wait_ready();
        self.active.store(next, Release);
        entry.activate();
    }

    /// Drain a buffer whose every slot has completed, then hand it back.
    fn drain_full(&self, index: usize) {
        let count = self.geometry.slot_count;
        self.writer.flush(index, self.records(index, count));
        unsafe { self.clear_prefixes(index, count) };
        self.entries[index].mark_drained();
    }

    /// Teardown: drain every buffer holding completed records, in index
    /// order, and stop accepting records. A second call does nothing.
    ///
    /// No producer may be storing concurrently.
    pub fn flush_partial(&self) -> PoolStats {
        if self.closed.swap(true, AcqRel) {
            return self.stats();
        }

        for (index, entry) in self.entries.iter().enumerate() {
            let completed = entry.completed_count();
            if completed > 0 {
                let written = self.writer.flush(index, self.records(index, completed));
                unsafe { self.clear_prefixes(index, completed) };
                entry.completed.store(0, Release);
                debug!(buffer = index, records = written, "flushed partial trace buffer");
            }
        }

        let stats = self.stats();
        info!(
            flushes = stats.flushes,
            records = stats.records_written,
            write_errors = stats.write_errors,
            "trace buffer pool closed"
        );
        stats
    }

    /// Write the session header through the writer. Must precede any record.
    pub fn write_header(&self, pointer_width: u8) -> Result<()> {
        self.writer.write_header(pointer_width)?;
        Ok(())
    }

    /// The first `count` records of buffer `index`, in slot order.
    fn records(&self, index: usize, count: usize) -> impl Iterator<Item = &[u8]> + '_ {
        (0..count).map(move |slot| unsafe { self.read_slot(index, slot) })
    }

    /// # Safety
    /// The caller must own `slot` of `buffer` (reserved, not yet completed).
    #[inline]
    unsafe fn write_slot(&self, buffer: usize, slot: usize, record: &[u8]) {
        let base = self.slot_ptr(buffer, slot);
        let prefix = (record.len() as u32).to_le_bytes();
        ptr::copy_nonoverlapping(prefix.as_ptr(), base, SLOT_LEN_PREFIX);
        ptr::copy_nonoverlapping(record.as_ptr(), base.add(SLOT_LEN_PREFIX), record.len());
    }

    /// # Safety
    /// `slot` must be completed and not writable until the buffer is
    /// drained. A slot that was never written reads as empty.
    #[inline]
    unsafe fn read_slot(&self, buffer: usize, slot: usize) -> &[u8] {
        let base = self.slot_ptr(buffer, slot);
        let mut prefix = [0u8; SLOT_LEN_PREFIX];
        ptr::copy_nonoverlapping(base, prefix.as_mut_ptr(), SLOT_LEN_PREFIX);
        let len = (u32::from_le_bytes(prefix) as usize).min(self.geometry.max_record_size);
        std::slice::from_raw_parts(base.add(SLOT_LEN_PREFIX), len)
    }

    /// Zero the length prefixes of the first `count` slots so a stale record
    /// can never be written out twice.
    ///
    /// # Safety
    /// Same ownership rule as [`Self::read_slot`].
    unsafe fn clear_prefixes(&self, buffer: usize, count: usize) {
        for slot in 0..count {
            ptr::write_bytes(self.slot_ptr(buffer, slot), 0, SLOT_LEN_PREFIX);
        }
    }

    #[inline]
    unsafe fn slot_ptr(&self, buffer: usize, slot: usize) -> *mut u8 {
        self.storage
            .as_ptr()
            .add(self.geometry.slot_offset(buffer, slot))
    }

    pub fn geometry(&self) -> &PoolGeometry {
        &self.geometry
    }

    /// Control block of buffer `index`.
    pub fn entry(&self, index: usize) -> &BufferEntry {
        &self.entries[index]
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Acquire)
    }

    pub fn stats(&self) -> PoolStats {
        let w = self.writer.stats();
        PoolStats {
            flushes: w.flushes,
            records_written: w.records_written,
            bytes_written: w.bytes_written,
            write_errors: w.write_errors,
        }
    }
}

impl<W: Write> Drop for TraceBufferPool<W> {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.storage.as_ptr(), self.storage_layout);
        }
    }
}

// Sequential writer: drains completed buffers to the output sink.
//
// A single mutex serialises every flush, so the sink sees buffers in the
// order they were handed over, never interleaved.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error};

/// Counters kept by the writer. Snapshot via [`SequentialWriter::stats`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Completed `flush` calls (full or partial buffers).
    pub flushes: u64,
    /// Records handed to the sink without error.
    pub records_written: u64,
    /// Payload bytes handed to the sink, header included.
    pub bytes_written: u64,
    /// Sink errors seen; each aborts the rest of its flush.
    pub write_errors: u64,
}

pub struct SequentialWriter<W: Write> {
    sink: Mutex<W>,
    flushes: AtomicU64,
    records_written: AtomicU64,
    bytes_written: AtomicU64,
    write_errors: AtomicU64,
    error_reported: AtomicBool,
}

impl<W: Write> SequentialWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
            flushes: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            error_reported: AtomicBool::new(false),
        }
    }

    /// Write the one-byte session header carrying the pointer width.
    ///
    /// Unlike flush failures, a header failure is returned: without it the
    /// file cannot be decoded.
    pub fn write_header(&self, pointer_width: u8) -> io::Result<()> {
        let mut sink = self.sink.lock();
        sink.write_all(&[pointer_width])?;
        sink.flush()?;
        self.bytes_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Write `records` to the sink in order, holding the writer lock for the
    /// whole drain. Empty records are skipped.
    ///
    /// Short writes are retried until the record is out. On a sink error the
    /// remainder of this flush is dropped and the error is reported once per
    /// writer; later errors are only counted. Returns the number of records
    /// written.
    pub fn flush<'a, I>(&self, buffer_index: usize, records: I) -> usize
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut sink = self.sink.lock();
        let mut written = 0usize;
        let mut bytes = 0u64;

        for record in records {
            if record.is_empty() {
                continue;
            }
            if let Err(e) = sink.write_all(record) {
                self.report(buffer_index, &e);
                break;
            }
            written += 1;
            bytes += record.len() as u64;
        }

        if let Err(e) = sink.flush() {
            self.report(buffer_index, &e);
        }
        drop(sink);

        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_written
            .fetch_add(written as u64, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        debug!(buffer = buffer_index, records = written, "flushed trace buffer");
        written
    }

    fn report(&self, buffer_index: usize, err: &io::Error) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        if !self.error_reported.swap(true, Ordering::AcqRel) {
            error!(buffer = buffer_index, error = %err, "trace sink write failed; dropping rest of buffer");
        }
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            flushes: self.flushes.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Whether a flush currently holds the writer.
    pub fn is_flushing(&self) -> bool {
        self.sink.is_locked()
    }
}

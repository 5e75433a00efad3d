// Output sinks for the sequential writer.
//
// `FdSink` writes straight to a file descriptor with write(2), which is what
// the instrumentation start-up code hands over. `MemorySink` keeps the bytes
// in memory for in-process capture.

use crate::error::{Result, TraceError};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// `rw-r--r--`, the mode trace files are created with.
const TRACE_FILE_MODE: u32 = 0o644;

/// An append-only sink over a raw file descriptor.
#[derive(Debug)]
pub struct FdSink {
    fd: RawFd,
    owned: bool,
}

impl FdSink {
    /// Create (or truncate) `path` and take ownership of its descriptor.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(TRACE_FILE_MODE)
            .open(path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Cannot open trace output file {}: {}", path.display(), e),
                )
            })?;

        Ok(Self {
            fd: file.into_raw_fd(),
            owned: true,
        })
    }

    /// Wrap a descriptor owned by someone else. It is not closed on drop.
    pub fn from_raw_fd(fd: RawFd) -> Result<Self> {
        Self::validate_descriptor(fd)?;
        Ok(Self { fd, owned: false })
    }

    /// A descriptor is usable if it is positive and open.
    pub fn validate_descriptor(fd: RawFd) -> Result<()> {
        if fd <= 0 {
            return Err(TraceError::InvalidDescriptor(fd));
        }
        if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
            return Err(TraceError::InvalidDescriptor(fd));
        }
        Ok(())
    }
}

impl Write for FdSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for FdSink {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FdSink {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

/// A clonable in-memory sink. All clones share the same bytes.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    bytes: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `flush()` calls received, one per drained buffer plus one
    /// for the session header.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Acquire)
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

use std::env;
use std::io::Write;
use std::os::fd::RawFd;
use std::path::PathBuf;

use super::encoder::native_pointer_width;
use super::recorder::TraceRecorder;
use super::Pool::layout::{CACHE_SIZE, NUMBER_OF_CACHES};
use crate::error::{Result, TraceError};
use crate::Core::clock::{Clock, MonotonicClock};
use crate::Core::sink::FdSink;

/// Output file used when `DMXP_TRACE_OUTPUT` is not set.
pub const DEFAULT_OUTPUT_PATH: &str = "test.bin";

pub const ENV_OUTPUT: &str = "DMXP_TRACE_OUTPUT";
pub const ENV_BUFFERS: &str = "DMXP_TRACE_BUFFERS";
pub const ENV_BUFFER_SIZE: &str = "DMXP_TRACE_BUFFER_SIZE";

/// Settings for one trace session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecorderConfig {
    pub buffer_count: usize,
    pub buffer_size: usize,
    pub pointer_width: u8,
    pub output_path: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            buffer_count: NUMBER_OF_CACHES,
            buffer_size: CACHE_SIZE,
            pointer_width: native_pointer_width(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

impl RecorderConfig {
    /// Defaults overridden by `DMXP_TRACE_OUTPUT`, `DMXP_TRACE_BUFFERS` and
    /// `DMXP_TRACE_BUFFER_SIZE`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = env::var_os(ENV_OUTPUT) {
            config.output_path = PathBuf::from(path);
        }
        if let Some(n) = parse_env(ENV_BUFFERS)? {
            config.buffer_count = n;
        }
        if let Some(n) = parse_env(ENV_BUFFER_SIZE)? {
            config.buffer_size = n;
        }
        Ok(config)
    }
}

fn parse_env(key: &str) -> Result<Option<usize>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TraceError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(TraceError::InvalidConfig(format!("{key}: {e}"))),
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecorderBuilder {
    config: RecorderConfig,
}

impl RecorderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RecorderConfig) -> Self {
        Self { config }
    }

    pub fn with_buffer_count(mut self, count: usize) -> Self {
        self.config.buffer_count = count;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn with_pointer_width(mut self, width: u8) -> Self {
        self.config.pointer_width = width;
        self
    }

    pub fn with_output_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn build<W: Write + Send>(self, sink: W) -> Result<TraceRecorder<W>> {
        self.build_with_clock(sink, MonotonicClock)
    }

    pub fn build_with_clock<W: Write + Send, C: Clock>(
        self,
        sink: W,
        clock: C,
    ) -> Result<TraceRecorder<W, C>> {
        TraceRecorder::with_clock(
            sink,
            clock,
            self.config.buffer_count,
            self.config.buffer_size,
            self.config.pointer_width,
        )
    }

    /// Create the configured output file and record into it.
    pub fn build_to_file(self) -> Result<TraceRecorder<FdSink>> {
        let sink = FdSink::create(&self.config.output_path)?;
        self.build(sink)
    }

    /// Record into a descriptor opened by the host process.
    pub fn build_to_fd(self, fd: RawFd) -> Result<TraceRecorder<FdSink>> {
        let sink = FdSink::from_raw_fd(fd)?;
        self.build(sink)
    }
}

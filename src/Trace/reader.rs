// Decoder for trace output: one pointer-width byte, then fixed-width records.

use std::path::Path;

use super::encoder::{decode, record_size, validate_pointer_width};
use super::Structs::TraceEvent;
use crate::error::{Result, TraceError};

pub struct TraceReader<'a> {
    data: &'a [u8],
    pointer_width: u8,
    offset: usize,
}

impl<'a> TraceReader<'a> {
    /// Parse the session header of `data`.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let &pointer_width = data.first().ok_or(TraceError::Truncated {
            expected: 1,
            found: 0,
        })?;
        let pointer_width = validate_pointer_width(pointer_width)?;
        Ok(Self {
            data,
            pointer_width,
            offset: 1,
        })
    }

    pub fn pointer_width(&self) -> u8 {
        self.pointer_width
    }

    pub fn record_size(&self) -> usize {
        record_size(self.pointer_width)
    }

    /// Records left, counting a trailing partial record as one.
    pub fn remaining(&self) -> usize {
        let left = self.data.len() - self.offset;
        left.div_ceil(self.record_size())
    }

    /// Decode everything, stopping at the first malformed record.
    pub fn read_all(data: &'a [u8]) -> Result<Vec<TraceEvent>> {
        Self::new(data)?.collect()
    }

    /// Read and decode a whole trace file.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<TraceEvent>> {
        let bytes = std::fs::read(path)?;
        TraceReader::read_all(&bytes)
    }
}

impl Iterator for TraceReader<'_> {
    type Item = Result<TraceEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.offset..];
        let size = self.record_size();
        if rest.len() < size {
            // Report once, then stop.
            self.offset = self.data.len();
            return Some(Err(TraceError::Truncated {
                expected: size,
                found: rest.len(),
            }));
        }
        self.offset += size;
        Some(decode(&rest[..size], self.pointer_width))
    }
}

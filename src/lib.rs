// Module naming follows project convention (capitalised subsystem modules)
#[allow(non_snake_case)]
pub mod Trace;
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Debug;
pub mod error;
pub mod ffi;

pub use error::{Result, TraceError};
pub use Trace::{
    EventKind, RecorderBuilder, RecorderConfig, RecorderStats, Timestamp, TraceEvent,
    TraceHooks, TraceReader, TraceRecorder,
};

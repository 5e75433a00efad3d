mod builder;
mod hooks;
mod recorder;

pub mod encoder;
pub mod reader;

pub use builder::{RecorderBuilder, RecorderConfig};
pub use hooks::{TraceHooks, TraceScope};
pub use reader::TraceReader;
pub use recorder::{RecorderStats, TraceRecorder};
pub use Structs::{EventKind, Timestamp, TraceEvent};

pub mod Pool {
    pub mod Pool;
    pub mod Pool_impl;
    pub mod layout;
    pub use Pool::{PoolStats, TraceBufferPool}; // re-export for stable path
}

pub mod Structs {
    pub mod Event_Structs;
    pub use Event_Structs::{EventKind, Timestamp, TraceEvent}; // re-export for stable path
}

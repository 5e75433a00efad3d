pub mod clock;
pub mod futex;
pub mod sink;
pub mod writer;

pub use clock::{Clock, MonotonicClock};
pub use sink::{FdSink, MemorySink};
pub use writer::{SequentialWriter, WriterStats};

use crate::Trace::Structs::Timestamp;
use std::io;

/// Source of event timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> io::Result<Timestamp>;
}

/// `CLOCK_MONOTONIC` via clock_gettime(2).
#[derive(Copy, Clone, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> io::Result<Timestamp> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Timestamp::new(ts.tv_sec as i64, ts.tv_nsec as i64))
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> io::Result<Timestamp> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> io::Result<Timestamp> {
        (**self).now()
    }
}

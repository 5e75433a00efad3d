use crate::error::{Result, TraceError};
use crate::Core::futex::{futex_wait, futex_wake_all};
use crossbeam_utils::{Backoff, CachePadded};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Number of buffers in the pool. Only one of them can be written to the
/// sink at a time; the others keep accepting events meanwhile.
pub const NUMBER_OF_CACHES: usize = 4;

/// Nominal byte size of one buffer, used to derive the slot count.
pub const CACHE_SIZE: usize = 500;

/// Bytes of the little-endian `u32` length prefix at the start of a slot.
pub const SLOT_LEN_PREFIX: usize = 4;

/// Slots added on top of `CACHE_SIZE / max_record_size` so that a buffer
/// always has at least this many slots, whatever the record size.
pub const SLOT_COUNT_SLACK: usize = 4;

/// Alignment of the backing storage and of each buffer within it.
pub const BUFFER_ALIGN: usize = 128;

const BUSY: u32 = 0;
const READY: u32 = 1;

/// `reserved` value of a buffer that has never been active. Any reservation
/// against it overshoots, exactly like one against a drained buffer.
const NEVER_ACTIVE: usize = usize::MAX / 2;

/// Control block of one buffer.
///
/// Lifecycle: `Filling` (active, `ready == false`) -> `Full`
/// (`completed == slot_count`) -> `Flushing` -> `Empty` (`completed == 0`,
/// `ready == true`) -> `Filling` again once a rotation activates it.
///
/// Outside `Filling`, `reserved` is always greater than `slot_count`, so a
/// producer holding a stale `active` index can only overshoot.
///
/// `reserved` and `completed` sit on separate cache lines: every producer
/// hits `reserved` first and `completed` only after its copy.
#[repr(C, align(128))]
pub struct BufferEntry {
    /// Slots claimed by producers. Grows past `slot_count` while producers
    /// overshoot; it is cleared only after the buffer is published active.
    pub reserved: CachePadded<AtomicUsize>,

    /// Slots whose record has been fully copied in.
    pub completed: CachePadded<AtomicUsize>,

    /// `1` once the buffer has been drained and may be activated again.
    /// Doubles as the futex word a rotating producer sleeps on.
    pub ready: AtomicU32,
}

impl BufferEntry {
    /// `ready == false` builds the initially active buffer; the others start
    /// drained and unreservable until their first activation.
    pub fn new(ready: bool) -> Self {
        Self {
            reserved: CachePadded::new(AtomicUsize::new(if ready { NEVER_ACTIVE } else { 0 })),
            completed: CachePadded::new(AtomicUsize::new(0)),
            ready: AtomicU32::new(if ready { READY } else { BUSY }),
        }
    }

    /// Claim the next slot index. Every call returns a distinct value until
    /// the buffer is activated again.
    #[inline]
    pub fn reserve(&self) -> usize {
        self.reserved.fetch_add(1, Ordering::AcqRel)
    }

    /// Mark one slot as written and return the new completed count.
    ///
    /// The `AcqRel` increment is the synchronisation point for the flush:
    /// whoever observes `slot_count` here also observes every slot write.
    #[inline]
    pub fn complete(&self) -> usize {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) == READY
    }

    /// Block until the buffer has been drained: spin with backoff first,
    /// then sleep until `mark_drained` wakes us.
    pub fn wait_ready(&self) {
        let backoff = Backoff::new();
        while !self.is_ready() {
            if backoff.is_completed() {
                futex_wait(&self.ready, BUSY);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Called by the flushing producer once the slots have been written out.
    pub fn mark_drained(&self) {
        self.completed.store(0, Ordering::Relaxed);
        self.ready.store(READY, Ordering::Release);
        futex_wake_all(&self.ready);
    }

    /// Called by the rotating producer after `wait_ready()` returned and
    /// right after the buffer was published as active.
    ///
    /// Resetting only after publication means no rotation out of this
    /// buffer can start before `active` points at it.
    pub fn activate(&self) {
        self.ready.store(BUSY, Ordering::Relaxed);
        self.reserved.store(0, Ordering::Release);
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }
}

/// Byte geometry of the pool, fixed at initialisation.
///
/// ```text
/// +-----------------------------------------------------------+
/// |                       one buffer                          |
/// +-------------------+-------------------+-------------------+
/// |      slot 0       |      slot 1       |      slot 2       |
/// +----+--------------+----+--------------+----+--------------+
/// | 4B | record bytes | 4B | record bytes | 4B | record bytes |
/// +----+--------------+----+--------------+----+--------------+
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolGeometry {
    /// Number of buffers.
    pub buffer_count: usize,
    /// Nominal buffer size the slot count was derived from.
    pub cache_size: usize,
    /// Largest record a slot can hold.
    pub max_record_size: usize,
    /// Slots per buffer.
    pub slot_count: usize,
    /// Bytes per slot (`max_record_size + SLOT_LEN_PREFIX`).
    pub slot_stride: usize,
    /// Bytes between the starts of two consecutive buffers.
    pub buffer_stride: usize,
}

impl PoolGeometry {
    pub fn new(buffer_count: usize, cache_size: usize, max_record_size: usize) -> Result<Self> {
        if max_record_size == 0 {
            return Err(TraceError::InvalidRecordSize);
        }
        if max_record_size > u32::MAX as usize {
            return Err(TraceError::RecordTooLarge {
                len: max_record_size,
                max: u32::MAX as usize,
            });
        }
        if buffer_count == 0 {
            return Err(TraceError::InvalidConfig(
                "buffer count must be at least 1".into(),
            ));
        }
        if cache_size == 0 {
            return Err(TraceError::InvalidConfig(
                "buffer size must be at least 1 byte".into(),
            ));
        }

        let overflow = || {
            TraceError::InvalidConfig(format!(
                "{buffer_count} buffers of {cache_size} bytes overflow the address space"
            ))
        };

        let slot_count = (cache_size / max_record_size)
            .checked_add(SLOT_COUNT_SLACK)
            .ok_or_else(overflow)?;
        let slot_stride = max_record_size + SLOT_LEN_PREFIX;
        let buffer_stride = slot_count
            .checked_mul(slot_stride)
            .and_then(|bytes| bytes.checked_add(BUFFER_ALIGN - 1))
            .ok_or_else(overflow)?
            & !(BUFFER_ALIGN - 1);
        if buffer_count.checked_mul(buffer_stride).is_none() {
            return Err(overflow());
        }

        Ok(Self {
            buffer_count,
            cache_size,
            max_record_size,
            slot_count,
            slot_stride,
            buffer_stride,
        })
    }

    /// `cache_size / max_record_size + SLOT_COUNT_SLACK`; never zero.
    #[inline]
    pub const fn slot_count_for(cache_size: usize, max_record_size: usize) -> usize {
        (cache_size / max_record_size).saturating_add(SLOT_COUNT_SLACK)
    }

    /// Offset of `slot` in `buffer` from the start of the backing storage.
    #[inline]
    pub fn slot_offset(&self, buffer: usize, slot: usize) -> usize {
        buffer * self.buffer_stride + slot * self.slot_stride
    }

    /// Size of the backing storage for all buffers. [`PoolGeometry::new`]
    /// rejects geometries where this would overflow.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.buffer_count * self.buffer_stride
    }

    /// Index of the buffer that follows `index` in round-robin order.
    #[inline]
    pub fn next_buffer(&self, index: usize) -> usize {
        (index + 1) % self.buffer_count
    }
}

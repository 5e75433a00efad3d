// Layout checks for the per-buffer control block. The two counters are hit
// by every producer, so they must not share a cache line.
use crossbeam_utils::CachePadded;
use dmxp_fntrace::Trace::Pool::layout::{BufferEntry, BUFFER_ALIGN};
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicUsize;

#[test]
fn test_buffer_entry_layout() {
    let size = size_of::<BufferEntry>();
    let align = align_of::<BufferEntry>();
    let off_reserved = offset_of!(BufferEntry, reserved);
    let off_completed = offset_of!(BufferEntry, completed);
    let off_ready = offset_of!(BufferEntry, ready);
    let line = align_of::<CachePadded<AtomicUsize>>();

    println!(
        "BufferEntry => size: {size}, align: {align}, cache line: {line}, offsets: [reserved:{off_reserved}, completed:{off_completed}, ready:{off_ready}]"
    );

    assert!(align >= BUFFER_ALIGN);
    assert_eq!(size % align, 0);
    assert_eq!(off_reserved, 0);
    assert!(off_completed >= line, "completed shares a cache line with reserved");
    assert!(off_ready >= off_completed + line);
}

// The event path must not touch the heap once the recorder is built.
//
// dhat only allows one profiler per process, so this file holds a single test.
//
// cargo test --test allocation_tracking -- --nocapture

use dmxp_fntrace::RecorderBuilder;

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[test]
fn event_path_is_allocation_free() {
    let _profiler = dhat::Profiler::builder().testing().build();

    let recorder = RecorderBuilder::new()
        .with_buffer_count(2)
        .build(std::io::sink())
        .unwrap();

    // Warm up: run a few fill cycles so every log callsite is registered.
    for i in 0..200 {
        recorder.on_enter(i, i + 1);
    }

    let before = dhat::HeapStats::get();
    for i in 0..10_000 {
        recorder.on_enter(i, i + 1);
        recorder.on_exit(i, i + 1);
    }
    let after = dhat::HeapStats::get();

    println!(
        "blocks before: {}, after: {}, flushes: {}",
        before.total_blocks,
        after.total_blocks,
        recorder.stats().flushes
    );
    dhat::assert_eq!(after.total_blocks, before.total_blocks);
}

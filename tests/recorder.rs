use dmxp_fntrace::Core::clock::Clock;
use dmxp_fntrace::Core::sink::{FdSink, MemorySink};
use dmxp_fntrace::Trace::encoder::record_size;
use dmxp_fntrace::{
    EventKind, RecorderBuilder, RecorderConfig, Timestamp, TraceError, TraceEvent, TraceHooks,
    TraceReader, TraceRecorder,
};
use serial_test::serial;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

struct FixedClock(Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> io::Result<Timestamp> {
        Ok(self.0)
    }
}

/// Succeeds `good` times, then fails forever.
struct FlakyClock {
    good: usize,
    calls: AtomicUsize,
}

impl Clock for FlakyClock {
    fn now(&self) -> io::Result<Timestamp> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n < self.good {
            Ok(Timestamp::new(100 + n as i64, 7))
        } else {
            Err(io::Error::new(io::ErrorKind::Other, "clock unavailable"))
        }
    }
}

fn temp_trace_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "dmxp_fntrace_{}_{}_{}.bin",
        tag,
        std::process::id(),
        fastrand::u32(..)
    ))
}

#[test]
fn enter_event_round_trips_through_pool_and_writer() {
    let sink = MemorySink::new();
    let ts = Timestamp::new(42, 123_456_789);
    let recorder = RecorderBuilder::new()
        .build_with_clock(sink.clone(), FixedClock(ts))
        .unwrap();

    recorder.on_enter(0xdead_beef, 0x0bad_cafe);
    recorder.deinit();

    let bytes = sink.contents();
    assert_eq!(bytes[0], recorder.pointer_width());
    assert_eq!(bytes.len(), 1 + record_size(recorder.pointer_width()));

    let events = TraceReader::read_all(&bytes).unwrap();
    assert_eq!(events, vec![TraceEvent::enter(ts, 0xdead_beef, 0x0bad_cafe)]);
}

#[test]
fn header_is_written_before_any_event() {
    let sink = MemorySink::new();
    let recorder = RecorderBuilder::new()
        .with_pointer_width(4)
        .build(sink.clone())
        .unwrap();
    assert_eq!(sink.contents(), vec![4u8]);

    recorder.on_exit(0x10, 0x20);
    let stats = recorder.deinit();
    assert_eq!(stats.records_written, 1);
    assert_eq!(stats.bytes_written, 1 + record_size(4) as u64);

    let events = TraceReader::read_all(&sink.contents()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Exit);
    assert_eq!((events[0].function_id, events[0].caller_id), (0x10, 0x20));
}

#[test]
fn rejects_unsupported_pointer_width() {
    let err = RecorderBuilder::new()
        .with_pointer_width(2)
        .build(MemorySink::new())
        .unwrap_err();
    assert!(matches!(err, TraceError::UnsupportedPointerWidth(2)));
}

#[test]
fn clock_failure_falls_back_to_last_reading() {
    let sink = MemorySink::new();
    let recorder = RecorderBuilder::new()
        .build_with_clock(
            sink.clone(),
            FlakyClock {
                good: 1,
                calls: AtomicUsize::new(0),
            },
        )
        .unwrap();

    // Fresh thread so the thread-local fallback starts empty.
    thread::scope(|s| {
        s.spawn(|| {
            recorder.on_enter(1, 0);
            recorder.on_enter(2, 1);
            recorder.on_exit(2, 1);
        });
    });
    let stats = recorder.deinit();
    assert_eq!(stats.clock_failures, 2);

    let events = TraceReader::read_all(&sink.contents()).unwrap();
    assert_eq!(events.len(), 3, "events must not be dropped on clock failure");
    assert!(events.iter().all(|e| e.timestamp == Timestamp::new(100, 7)));
}

#[test]
fn clock_failure_without_prior_reading_uses_zero() {
    let sink = MemorySink::new();
    let recorder = RecorderBuilder::new()
        .build_with_clock(
            sink.clone(),
            FlakyClock {
                good: 0,
                calls: AtomicUsize::new(0),
            },
        )
        .unwrap();

    thread::scope(|s| {
        s.spawn(|| recorder.on_enter(5, 6));
    });
    recorder.deinit();

    let events = TraceReader::read_all(&sink.contents()).unwrap();
    assert_eq!(events, vec![TraceEvent::enter(Timestamp::ZERO, 5, 6)]);
}

#[test]
fn concurrent_callers_lose_nothing() {
    let sink = MemorySink::new();
    let recorder = Arc::new(RecorderBuilder::new().build(sink.clone()).unwrap());
    let threads = 6usize;
    let per_thread = 2_500usize;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let recorder = recorder.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    recorder.on_enter(t, i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let stats = recorder.deinit();
    assert_eq!(stats.records_written as usize, threads * per_thread);

    let events = TraceReader::read_all(&sink.contents()).unwrap();
    assert_eq!(events.len(), threads * per_thread);
    let ids: HashSet<_> = events.iter().map(|e| (e.function_id, e.caller_id)).collect();
    assert_eq!(ids.len(), threads * per_thread);
}

#[test]
fn events_after_deinit_are_refused() {
    let sink = MemorySink::new();
    let recorder = RecorderBuilder::new().build(sink.clone()).unwrap();
    recorder.on_enter(1, 1);
    let first = recorder.deinit();
    assert!(recorder.is_closed());

    assert!(matches!(
        recorder.record(EventKind::Enter, 2, 2),
        Err(TraceError::Closed)
    ));
    recorder.on_exit(1, 1);
    assert_eq!(recorder.deinit(), first);
    assert_eq!(TraceReader::read_all(&sink.contents()).unwrap().len(), 1);
}

#[test]
fn dropping_recorder_flushes_pending_events() {
    let sink = MemorySink::new();
    {
        let recorder = RecorderBuilder::new().build(sink.clone()).unwrap();
        for i in 0..5 {
            recorder.on_enter(i, 0);
        }
    }
    assert_eq!(TraceReader::read_all(&sink.contents()).unwrap().len(), 5);
}

#[test]
fn scope_guard_pairs_enter_and_exit() {
    let sink = MemorySink::new();
    let recorder = RecorderBuilder::new()
        .build_with_clock(sink.clone(), FixedClock(Timestamp::new(1, 0)))
        .unwrap();
    {
        let _outer = recorder.scope(0xA, 0x1);
        let _inner = recorder.scope(0xB, 0xA);
    }
    recorder.deinit();

    let kinds: Vec<_> = TraceReader::read_all(&sink.contents())
        .unwrap()
        .into_iter()
        .map(|e| (e.kind, e.function_id))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (EventKind::Enter, 0xA),
            (EventKind::Enter, 0xB),
            (EventKind::Exit, 0xB),
            (EventKind::Exit, 0xA),
        ]
    );
}

#[test]
fn records_into_a_trace_file() -> io::Result<()> {
    let path = temp_trace_path("file");
    let recorder = RecorderBuilder::new()
        .with_buffer_count(2)
        .with_output_path(&path)
        .build_to_file()?;
    for i in 0..100 {
        recorder.on_enter(i, 0);
        recorder.on_exit(i, 0);
    }
    recorder.deinit();
    drop(recorder);

    let events = TraceReader::read_file(&path)?;
    std::fs::remove_file(&path)?;
    assert_eq!(events.len(), 200);
    Ok(())
}

#[test]
fn rejects_invalid_descriptors() {
    assert!(matches!(
        FdSink::from_raw_fd(-1),
        Err(TraceError::InvalidDescriptor(-1))
    ));
    assert!(matches!(
        FdSink::from_raw_fd(0),
        Err(TraceError::InvalidDescriptor(0))
    ));
    assert!(matches!(
        RecorderBuilder::new().build_to_fd(987_654),
        Err(TraceError::InvalidDescriptor(987_654))
    ));
}

#[test]
fn default_recorder_uses_native_pointer_width() {
    let recorder: TraceRecorder<MemorySink> = TraceRecorder::init(MemorySink::new()).unwrap();
    assert_eq!(recorder.pointer_width() as usize, std::mem::size_of::<usize>());
    assert_eq!(
        recorder.pool().geometry().max_record_size,
        record_size(recorder.pointer_width())
    );
}

#[test]
#[serial]
fn config_reads_environment() {
    std::env::set_var("DMXP_TRACE_OUTPUT", "/tmp/from_env.bin");
    std::env::set_var("DMXP_TRACE_BUFFERS", "8");
    std::env::set_var("DMXP_TRACE_BUFFER_SIZE", "4096");
    let config = RecorderConfig::from_env().unwrap();
    assert_eq!(config.output_path, PathBuf::from("/tmp/from_env.bin"));
    assert_eq!(config.buffer_count, 8);
    assert_eq!(config.buffer_size, 4096);

    std::env::set_var("DMXP_TRACE_BUFFERS", "many");
    assert!(matches!(
        RecorderConfig::from_env(),
        Err(TraceError::InvalidConfig(_))
    ));

    for key in ["DMXP_TRACE_OUTPUT", "DMXP_TRACE_BUFFERS", "DMXP_TRACE_BUFFER_SIZE"] {
        std::env::remove_var(key);
    }
    assert_eq!(RecorderConfig::from_env().unwrap(), RecorderConfig::default());
}

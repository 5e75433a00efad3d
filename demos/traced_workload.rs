// Trace a small multi-threaded call tree into a file, then read it back.
//
// cargo run --example traced_workload -- <output> [threads] [calls_per_thread]
use dmxp_fntrace::{EventKind, RecorderBuilder, TraceHooks, TraceReader};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn fake_call_tree<H: TraceHooks>(hooks: &H, depth: usize, caller: usize) {
    let function = 0x1000 + depth * 0x10;
    let _scope = hooks.scope(function, caller);
    if depth > 0 {
        fake_call_tree(hooks, depth - 1, function);
    }
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <output> [threads] [calls_per_thread]", args[0]);
        std::process::exit(1);
    }
    let output = args[1].clone();
    let threads: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(4);
    let calls: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10_000);

    let recorder = Arc::new(
        RecorderBuilder::new()
            .with_output_path(&output)
            .build_to_file()?,
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);

    // Handle Ctrl+C so a partial run still leaves a complete trace
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    println!("Tracing {} threads x {} calls into {}", threads, calls, output);
    let start = std::time::Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let recorder = Arc::clone(&recorder);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                for i in 0..calls {
                    if !running.load(Ordering::Relaxed) {
                        break;
                    }
                    fake_call_tree(&recorder, i % 4, 0xF000 + t);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("worker thread panicked");
    }

    let stats = recorder.deinit();
    println!("Recorded in {:.2?}: {:?}", start.elapsed(), stats);

    let events = TraceReader::read_file(&output)?;
    let enters = events.iter().filter(|e| e.kind == EventKind::Enter).count();
    let exits = events.len() - enters;
    println!(
        "Decoded {} events ({} enter / {} exit) from {}",
        events.len(),
        enters,
        exits,
        output
    );

    Ok(())
}

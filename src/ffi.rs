// Process-wide recorder and its C ABI.
//
// Host start-up code calls `dmxp_trace_init` (or `dmxp_trace_init_from_env`)
// once, instrumentation calls the enter/exit entry points, and shut-down
// code calls `dmxp_trace_deinit`. With the `cyg-profile` feature the
// `-finstrument-functions` hook symbols forward to the same recorder.

use crate::error::{Result, TraceError};
use crate::Core::sink::FdSink;
use crate::Trace::{RecorderBuilder, RecorderConfig, RecorderStats, TraceRecorder};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use tracing::{error, warn};

// Error codes
pub const DMXP_SUCCESS: i32 = 0;
pub const DMXP_ERROR_INVALID_ARG: i32 = -2;
pub const DMXP_ERROR_INTERNAL: i32 = -6;
pub const DMXP_ERROR_ALREADY_INITIALIZED: i32 = -7;
pub const DMXP_ERROR_NOT_INITIALIZED: i32 = -8;

/// The installed recorder, or null. Event hooks only ever load it.
static RECORDER: AtomicPtr<TraceRecorder<FdSink>> = AtomicPtr::new(ptr::null_mut());

/// Serialises install and teardown. Never taken on the event path.
static LIFECYCLE: Mutex<()> = parking_lot::const_mutex(());

lazy_static! {
    static ref ENV_CONFIG: RecorderConfig = RecorderConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "ignoring invalid trace configuration");
        RecorderConfig::default()
    });
}

// -----------------------------------------------------------------------------
// Rust API
// -----------------------------------------------------------------------------

/// Make `recorder` the process-wide recorder.
pub fn install(recorder: TraceRecorder<FdSink>) -> Result<()> {
    let _guard = LIFECYCLE.lock();
    publish(recorder)
}

/// Caller holds `LIFECYCLE`.
fn publish(recorder: TraceRecorder<FdSink>) -> Result<()> {
    let raw = Box::into_raw(Box::new(recorder));
    match RECORDER.compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => Ok(()),
        Err(_) => {
            // Never published, so still exclusively ours.
            drop(unsafe { Box::from_raw(raw) });
            Err(TraceError::AlreadyInstalled)
        }
    }
}

/// Tear down and drop the process-wide recorder, returning its final stats.
///
/// # Safety
/// No thread may be inside [`on_enter`] or [`on_exit`] (or the C hooks that
/// forward to them) while this runs, nor start one until it has returned.
/// Calls made after it returns are ignored.
pub unsafe fn uninstall() -> Result<RecorderStats> {
    let _guard = LIFECYCLE.lock();
    let raw = RECORDER.swap(ptr::null_mut(), Ordering::AcqRel);
    if raw.is_null() {
        return Err(TraceError::NotInstalled);
    }
    let recorder = Box::from_raw(raw);
    Ok(recorder.deinit())
}

pub fn is_installed() -> bool {
    !RECORDER.load(Ordering::Acquire).is_null()
}

#[inline]
fn installed() -> Option<&'static TraceRecorder<FdSink>> {
    // Valid until `uninstall`, whose contract excludes concurrent hooks.
    unsafe { RECORDER.load(Ordering::Acquire).as_ref() }
}

/// Record a function entry on the process-wide recorder, if any.
#[inline]
pub fn on_enter(function_id: usize, caller_id: usize) {
    if let Some(recorder) = installed() {
        recorder.on_enter(function_id, caller_id);
    }
}

/// Record a function exit on the process-wide recorder, if any.
#[inline]
pub fn on_exit(function_id: usize, caller_id: usize) {
    if let Some(recorder) = installed() {
        recorder.on_exit(function_id, caller_id);
    }
}

fn error_code(e: &TraceError) -> i32 {
    match e {
        TraceError::AlreadyInstalled => DMXP_ERROR_ALREADY_INITIALIZED,
        TraceError::NotInstalled => DMXP_ERROR_NOT_INITIALIZED,
        TraceError::InvalidDescriptor(_)
        | TraceError::InvalidConfig(_)
        | TraceError::InvalidRecordSize
        | TraceError::UnsupportedPointerWidth(_) => DMXP_ERROR_INVALID_ARG,
        _ => DMXP_ERROR_INTERNAL,
    }
}

// -----------------------------------------------------------------------------
// C API
// -----------------------------------------------------------------------------

/// Start tracing into an already open descriptor. The descriptor stays
/// owned by the caller.
///
/// # Returns
/// * 0 on success, negative error code otherwise.
#[no_mangle]
pub extern "C" fn dmxp_trace_init(fd: c_int) -> i32 {
    // Held across the build so a losing init never writes a header.
    let _guard = LIFECYCLE.lock();
    if is_installed() {
        return DMXP_ERROR_ALREADY_INITIALIZED;
    }
    let result = RecorderBuilder::from_config(ENV_CONFIG.clone())
        .build_to_fd(fd)
        .and_then(publish);
    match result {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => {
            error!(fd, error = %e, "failed to start tracing");
            error_code(&e)
        }
    }
}

/// Start tracing into the file named by `DMXP_TRACE_OUTPUT`.
///
/// Failing to open the output is fatal: the process exits with status 1.
#[no_mangle]
pub extern "C" fn dmxp_trace_init_from_env() -> i32 {
    let _guard = LIFECYCLE.lock();
    if is_installed() {
        return DMXP_ERROR_ALREADY_INITIALIZED;
    }
    let recorder = match RecorderBuilder::from_config(ENV_CONFIG.clone()).build_to_file() {
        Ok(recorder) => recorder,
        Err(e) => {
            let path = ENV_CONFIG.output_path.display();
            error!(path = %path, error = %e, "cannot open trace output");
            eprintln!("Cannot open output file: {}", e);
            std::process::exit(1);
        }
    };
    match publish(recorder) {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Flush partially filled buffers and stop tracing.
///
/// Every traced thread must have stopped emitting events; see [`uninstall`].
#[no_mangle]
pub extern "C" fn dmxp_trace_deinit() -> i32 {
    match unsafe { uninstall() } {
        Ok(_) => DMXP_SUCCESS,
        Err(e) => error_code(&e),
    }
}

#[no_mangle]
pub extern "C" fn dmxp_trace_on_enter(function: *const c_void, caller: *const c_void) {
    on_enter(function as usize, caller as usize);
}

#[no_mangle]
pub extern "C" fn dmxp_trace_on_exit(function: *const c_void, caller: *const c_void) {
    on_exit(function as usize, caller as usize);
}

#[cfg(feature = "cyg-profile")]
#[no_mangle]
pub extern "C" fn __cyg_profile_func_enter(function: *mut c_void, caller: *mut c_void) {
    on_enter(function as usize, caller as usize);
}

#[cfg(feature = "cyg-profile")]
#[no_mangle]
pub extern "C" fn __cyg_profile_func_exit(function: *mut c_void, caller: *mut c_void) {
    on_exit(function as usize, caller as usize);
}

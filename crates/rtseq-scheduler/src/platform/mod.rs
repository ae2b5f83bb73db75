//! OS thread attributes and high-precision sleep.
//!
//! Each backend exposes the same free functions plus a `PlatformSleep`
//! type. Attribute functions act on the calling thread only.

use std::io;
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux as imp;

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
use windows as imp;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod fallback;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
use fallback as imp;

pub(crate) use imp::{
    PlatformSleep, lock_process_memory, max_realtime_priority, set_current_thread_affinity,
    set_current_thread_priority,
};

/// Remaining time below which sleeping is skipped entirely in favour of spinning.
pub(crate) const SPIN_THRESHOLD: Duration = Duration::from_micros(100);

/// Portion of every sleep that is busy-spun for precision.
pub(crate) const SPIN_TAIL: Duration = Duration::from_micros(80);

/// Busy-spin until `target`.
#[inline]
pub(crate) fn spin_until(target: Instant) {
    while Instant::now() < target {
        std::hint::spin_loop();
    }
}

/// Last OS error code for the calling thread, 0 if unavailable.
#[cfg_attr(
    not(any(target_os = "windows", target_os = "linux")),
    expect(dead_code, reason = "fallback backend never reaches the OS")
)]
pub(crate) fn last_os_error_code() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

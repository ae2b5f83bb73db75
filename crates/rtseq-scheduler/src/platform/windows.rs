//! Windows-specific platform implementation.

#![expect(unsafe_code, reason = "thin wrappers around Win32 threading and timer calls")]

use std::time::{Duration, Instant};

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Threading::{
    CreateWaitableTimerW, GetCurrentThread, INFINITE, SetThreadAffinityMask, SetThreadPriority,
    SetWaitableTimer, THREAD_PRIORITY, THREAD_PRIORITY_ABOVE_NORMAL, THREAD_PRIORITY_HIGHEST,
    THREAD_PRIORITY_NORMAL, THREAD_PRIORITY_TIME_CRITICAL, WaitForSingleObject,
};

use super::{SPIN_TAIL, SPIN_THRESHOLD, last_os_error_code, spin_until};
use crate::error::PlatformError;

/// Top of the logical priority scale shared with the POSIX backend.
const LOGICAL_PRIORITY_MAX: i32 = 99;

/// Windows-specific sleep implementation.
#[derive(Debug)]
pub(crate) struct PlatformSleep {
    timer_handle: Option<HANDLE>,
}

impl PlatformSleep {
    /// Create new platform sleep instance.
    pub(crate) fn new() -> Self {
        Self { timer_handle: None }
    }

    /// Platform-specific high-precision sleep with busy-spin tail.
    ///
    /// Uses a waitable timer for the bulk of the sleep, then busy-spins
    /// for the final ~80 microseconds to achieve precise timing.
    pub(crate) fn sleep_until(&mut self, target: Instant) -> Result<(), PlatformError> {
        let Some(remaining) = target.checked_duration_since(Instant::now()) else {
            return Ok(());
        };

        if remaining >= SPIN_THRESHOLD {
            let timer = self.get_or_create_timer()?;
            let due_time = relative_due_time_100ns(remaining.saturating_sub(SPIN_TAIL));

            // SAFETY: `timer` is a live waitable timer owned by `self`.
            unsafe { SetWaitableTimer(timer, &due_time, 0, None, None, false) }.map_err(
                |err| PlatformError::Sleep {
                    code: err.code().0,
                },
            )?;
            // SAFETY: `timer` stays open until `self` is dropped.
            unsafe { WaitForSingleObject(timer, INFINITE) };
        }

        spin_until(target);
        Ok(())
    }

    fn get_or_create_timer(&mut self) -> Result<HANDLE, PlatformError> {
        if let Some(handle) = self.timer_handle {
            return Ok(handle);
        }

        // SAFETY: default security attributes and an anonymous timer.
        let timer = unsafe { CreateWaitableTimerW(None, true, None) }.map_err(|err| {
            PlatformError::Sleep {
                code: err.code().0,
            }
        })?;
        self.timer_handle = Some(timer);
        Ok(timer)
    }
}

impl Drop for PlatformSleep {
    fn drop(&mut self) {
        if let Some(handle) = self.timer_handle.take() {
            // SAFETY: the handle was created by `get_or_create_timer` and is closed once.
            if unsafe { CloseHandle(handle) }.is_err() {
                tracing::debug!("failed to close waitable timer handle");
            }
        }
    }
}

impl Default for PlatformSleep {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert duration to relative due time in 100ns units for waitable timer.
fn relative_due_time_100ns(duration: Duration) -> i64 {
    let ticks_100ns = i64::try_from(duration.as_nanos() / 100).unwrap_or(i64::MAX);
    -ticks_100ns.max(1)
}

/// Map the logical 1..=99 priority scale onto Windows priority bands.
fn windows_priority_level(priority: i32) -> THREAD_PRIORITY {
    match priority {
        p if p >= 90 => THREAD_PRIORITY_TIME_CRITICAL,
        p if p >= 60 => THREAD_PRIORITY_HIGHEST,
        p if p >= 30 => THREAD_PRIORITY_ABOVE_NORMAL,
        _ => THREAD_PRIORITY_NORMAL,
    }
}

/// Highest value on the logical priority scale.
pub(crate) fn max_realtime_priority() -> Option<i32> {
    Some(LOGICAL_PRIORITY_MAX)
}

/// Raise the calling thread's priority band. Returns the logical priority
/// that was requested after clamping.
pub(crate) fn set_current_thread_priority(priority: i32) -> Result<i32, PlatformError> {
    let requested = priority.clamp(1, LOGICAL_PRIORITY_MAX);

    // SAFETY: returns a pseudo-handle for the calling thread.
    let thread = unsafe { GetCurrentThread() };
    // SAFETY: `thread` is the calling thread's pseudo-handle.
    unsafe { SetThreadPriority(thread, windows_priority_level(requested)) }.map_err(|err| {
        PlatformError::Priority {
            requested,
            code: err.code().0,
        }
    })?;
    Ok(requested)
}

/// Pin the calling thread to a single core.
pub(crate) fn set_current_thread_affinity(core: usize) -> Result<(), PlatformError> {
    let Some(mask) = u32::try_from(core).ok().and_then(|c| 1usize.checked_shl(c)) else {
        return Err(PlatformError::AffinityOutOfRange { core });
    };

    // SAFETY: returns a pseudo-handle for the calling thread.
    let thread = unsafe { GetCurrentThread() };
    // SAFETY: `thread` is the calling thread's pseudo-handle.
    let previous = unsafe { SetThreadAffinityMask(thread, mask) };
    if previous == 0 {
        return Err(PlatformError::Affinity {
            core,
            code: last_os_error_code(),
        });
    }
    Ok(())
}

/// Memory locking is not offered on Windows.
pub(crate) fn lock_process_memory() -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported("memory locking"))
}

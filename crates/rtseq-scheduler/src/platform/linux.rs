//! Linux-specific platform implementation.

#![expect(unsafe_code, reason = "thin wrappers around libc scheduling and timer calls")]

use std::mem;
use std::ptr;
use std::time::Instant;

use libc::{
    CLOCK_MONOTONIC, EINTR, MCL_CURRENT, MCL_FUTURE, SCHED_FIFO, clock_nanosleep, cpu_set_t,
    mlockall, sched_param, timespec,
};

use super::{SPIN_TAIL, SPIN_THRESHOLD, last_os_error_code, spin_until};
use crate::error::PlatformError;

/// Linux-specific sleep implementation.
#[derive(Debug, Default)]
pub(crate) struct PlatformSleep;

impl PlatformSleep {
    /// Create new platform sleep instance.
    pub(crate) fn new() -> Self {
        Self
    }

    /// Platform-specific high-precision sleep with busy-spin tail.
    ///
    /// Uses `clock_nanosleep` for the bulk of the sleep, then busy-spins
    /// for the final ~80 microseconds. Interrupted sleeps are resumed.
    pub(crate) fn sleep_until(&mut self, target: Instant) -> Result<(), PlatformError> {
        loop {
            let Some(remaining) = target.checked_duration_since(Instant::now()) else {
                return Ok(());
            };
            if remaining < SPIN_THRESHOLD {
                break;
            }

            let coarse = remaining.saturating_sub(SPIN_TAIL);
            let ts = timespec {
                tv_sec: libc::time_t::try_from(coarse.as_secs()).unwrap_or(libc::time_t::MAX),
                tv_nsec: libc::c_long::try_from(coarse.subsec_nanos()).unwrap_or(0),
            };

            // SAFETY: `ts` is a valid timespec; the remainder pointer may be null.
            let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &ts, ptr::null_mut()) };
            match rc {
                0 => break,
                EINTR => {}
                code => return Err(PlatformError::Sleep { code }),
            }
        }

        spin_until(target);
        Ok(())
    }
}

fn fifo_priority_range() -> (i32, i32) {
    // SAFETY: pure query with a valid policy constant.
    let min = unsafe { libc::sched_get_priority_min(SCHED_FIFO) };
    // SAFETY: pure query with a valid policy constant.
    let max = unsafe { libc::sched_get_priority_max(SCHED_FIFO) };
    if min < 0 || max < min {
        (1, 99)
    } else {
        (min, max)
    }
}

/// Highest SCHED_FIFO priority.
pub(crate) fn max_realtime_priority() -> Option<i32> {
    let (_, max) = fifo_priority_range();
    Some(max)
}

/// Switch the calling thread to SCHED_FIFO at `priority`, clamped into the
/// policy's range. Returns the priority actually requested.
pub(crate) fn set_current_thread_priority(priority: i32) -> Result<i32, PlatformError> {
    let (min, max) = fifo_priority_range();
    let requested = priority.clamp(min, max);
    let param = sched_param {
        sched_priority: requested,
    };

    // SAFETY: always valid for the calling thread.
    let thread = unsafe { libc::pthread_self() };
    // SAFETY: `thread` is the calling thread and `param` outlives the call.
    let rc = unsafe { libc::pthread_setschedparam(thread, SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(PlatformError::Priority {
            requested,
            code: rc,
        });
    }
    Ok(requested)
}

/// Pin the calling thread to a single core.
pub(crate) fn set_current_thread_affinity(core: usize) -> Result<(), PlatformError> {
    let set_size = usize::try_from(libc::CPU_SETSIZE).unwrap_or(0);
    if core >= set_size {
        return Err(PlatformError::AffinityOutOfRange { core });
    }

    // SAFETY: cpu_set_t is a plain bit array; all zeroes is the empty set.
    let mut set: cpu_set_t = unsafe { mem::zeroed() };
    // SAFETY: `core` is below CPU_SETSIZE, checked above.
    unsafe { libc::CPU_SET(core, &mut set) };
    // SAFETY: pid 0 selects the calling thread; `set` is valid for the size passed.
    let rc = unsafe { libc::sched_setaffinity(0, mem::size_of::<cpu_set_t>(), &set) };
    if rc != 0 {
        return Err(PlatformError::Affinity {
            core,
            code: last_os_error_code(),
        });
    }
    Ok(())
}

/// Lock all current and future pages of the process into RAM.
pub(crate) fn lock_process_memory() -> Result<(), PlatformError> {
    // SAFETY: flags are valid constants; no pointers are involved.
    let rc = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
    if rc != 0 {
        return Err(PlatformError::LockMemory {
            code: last_os_error_code(),
        });
    }
    Ok(())
}

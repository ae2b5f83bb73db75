//! Fallback platform implementation for non-Windows, non-Linux systems.
//!
//! Thread attributes are reported as unsupported and sleeping uses the
//! standard library.

use std::time::Instant;

use super::{SPIN_TAIL, SPIN_THRESHOLD, spin_until};
use crate::error::PlatformError;

/// Fallback sleep implementation using standard library.
#[derive(Debug, Default)]
pub(crate) struct PlatformSleep;

impl PlatformSleep {
    /// Create new platform sleep instance.
    pub(crate) fn new() -> Self {
        Self
    }

    /// Fallback sleep using standard `thread::sleep` with the same
    /// busy-spin tail as the native backends.
    pub(crate) fn sleep_until(&mut self, target: Instant) -> Result<(), PlatformError> {
        if let Some(remaining) = target.checked_duration_since(Instant::now())
            && remaining >= SPIN_THRESHOLD
        {
            std::thread::sleep(remaining.saturating_sub(SPIN_TAIL));
        }
        spin_until(target);
        Ok(())
    }
}

pub(crate) fn max_realtime_priority() -> Option<i32> {
    None
}

pub(crate) fn set_current_thread_priority(_priority: i32) -> Result<i32, PlatformError> {
    Err(PlatformError::Unsupported("real-time thread priority"))
}

pub(crate) fn set_current_thread_affinity(_core: usize) -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported("cpu affinity"))
}

pub(crate) fn lock_process_memory() -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported("memory locking"))
}

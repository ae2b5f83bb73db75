//! Shutdown coordination with termination signals.
//!
//! A [`ShutdownHandle`] is a cloneable "shutdown requested" flag. While a
//! sequencer runs it may register its handle as the process's active
//! sequencer; a single process-wide SIGINT/SIGTERM handler then sets that
//! flag and does nothing else. The owner's supervising loop observes the
//! flag and performs the actual teardown outside the signal context.
//!
//! A signal that no sequencer will act on ends the process with
//! [`TERMINATED_EXIT_CODE`], as the default disposition would. That covers
//! a signal with no active sequencer and a repeated signal while the first
//! request is still pending.
//!
//! At most one sequencer is active per process. The registration is an RAII
//! guard released when the sequencer stops.

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Cloneable shutdown request flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Create a handle with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Safe to call from any thread, any number of times.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Whether two handles share the same flag.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.requested, &other.requested)
    }
}

/// Exit status of a process ended by a termination signal (128 + SIGINT).
pub const TERMINATED_EXIT_CODE: i32 = 130;

static ACTIVE: Mutex<Option<ShutdownHandle>> = parking_lot::const_mutex(None);

/// What the process does with one termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    /// The active sequencer was asked to stop.
    Shutdown,
    /// Nothing will observe the signal; the process exits.
    Terminate,
}

fn route_termination_signal() -> SignalAction {
    match ACTIVE.lock().as_ref() {
        Some(handle) if !handle.requested.swap(true, Ordering::AcqRel) => SignalAction::Shutdown,
        _ => SignalAction::Terminate,
    }
}

#[expect(
    clippy::exit,
    reason = "restores the default outcome of SIGINT/SIGTERM once no sequencer handles them"
)]
fn terminate() -> ! {
    std::process::exit(TERMINATED_EXIT_CODE)
}

/// Request shutdown of the active sequencer, if any.
///
/// Returns `true` if a sequencer was registered.
pub fn request_active_shutdown() -> bool {
    match ACTIVE.lock().as_ref() {
        Some(handle) => {
            handle.request();
            true
        }
        None => false,
    }
}

/// Whether a sequencer is currently registered for termination signals.
#[must_use]
pub fn has_active_sequencer() -> bool {
    ACTIVE.lock().is_some()
}

/// Install the process-wide termination handler. Runs at most once.
fn install_signal_handler() -> bool {
    static INSTALLED: OnceLock<bool> = OnceLock::new();
    *INSTALLED.get_or_init(|| {
        match ctrlc::set_handler(|| match route_termination_signal() {
            SignalAction::Shutdown => debug!("termination signal routed to the active sequencer"),
            SignalAction::Terminate => {
                warn!("termination signal with no pending shutdown to satisfy; exiting");
                terminate();
            }
        }) {
            Ok(()) => {
                debug!("termination signal handler installed");
                true
            }
            Err(err) => {
                warn!(error = %err, "could not install termination signal handler");
                false
            }
        }
    })
}

/// Registration of a handle as the active sequencer.
#[derive(Debug)]
pub(crate) struct SignalRegistration {
    handle: ShutdownHandle,
}

impl SignalRegistration {
    /// Register `handle` as the active sequencer.
    ///
    /// Returns `None`, after logging, if another sequencer is active.
    pub(crate) fn register(handle: &ShutdownHandle) -> Option<Self> {
        let installed = install_signal_handler();

        let mut active = ACTIVE.lock();
        if let Some(existing) = active.as_ref()
            && !existing.same_as(handle)
        {
            warn!("another sequencer already handles termination signals; not registering");
            return None;
        }
        *active = Some(handle.clone());
        debug!(handler_installed = installed, "sequencer registered for termination signals");

        Some(Self {
            handle: handle.clone(),
        })
    }
}

impl Drop for SignalRegistration {
    fn drop(&mut self) {
        let mut active = ACTIVE.lock();
        if active
            .as_ref()
            .is_some_and(|current| current.same_as(&self.handle))
        {
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_request_is_shared() {
        let handle = ShutdownHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_requested());
        clone.request();
        clone.request();
        assert!(handle.is_requested());
        assert!(handle.same_as(&clone));
        assert!(!handle.same_as(&ShutdownHandle::new()));
    }

    // Registration touches process-wide state, so every scenario lives in
    // one test to avoid interference between parallel tests.
    #[test]
    fn test_registration_lifecycle() {
        let first = ShutdownHandle::new();
        let second = ShutdownHandle::new();
        assert_eq!(route_termination_signal(), SignalAction::Terminate);

        let registration = SignalRegistration::register(&first);
        assert!(registration.is_some());
        assert!(has_active_sequencer());

        assert!(SignalRegistration::register(&second).is_none());

        assert_eq!(route_termination_signal(), SignalAction::Shutdown);
        assert!(first.is_requested());
        assert!(!second.is_requested());

        // A second signal before the owner stops ends the process.
        assert_eq!(route_termination_signal(), SignalAction::Terminate);
        assert!(request_active_shutdown());

        drop(registration);
        assert!(!has_active_sequencer());
        assert!(!request_active_shutdown());
        assert_eq!(route_termination_signal(), SignalAction::Terminate);

        let registration = SignalRegistration::register(&second);
        assert!(registration.is_some());
        drop(registration);
        assert!(!has_active_sequencer());
    }
}

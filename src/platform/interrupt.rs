//! SIGINT as a cooperative cancellation flag.
//!
//! The handler only stores `true` into the shared flag. Everything else
//! (killing a running shell command, abandoning a stream) happens on the
//! threads that poll it.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[cfg(unix)]
use signal_hook::{consts::SIGINT, low_level, SigId};

/// Keeps the flag registered until dropped.
#[cfg(unix)]
pub struct InterruptGuard {
    id: Option<SigId>,
    flag: Arc<AtomicBool>,
}

#[cfg(unix)]
impl InterruptGuard {
    /// Routes SIGINT into `flag`.
    pub fn install(flag: Arc<AtomicBool>) -> io::Result<Self> {
        let id = signal_hook::flag::register(SIGINT, Arc::clone(&flag))?;
        Ok(Self { id: Some(id), flag })
    }

    #[must_use]
    pub fn flag(&self) -> &Arc<AtomicBool> {
        &self.flag
    }

    /// Restores the previous disposition now rather than at drop.
    pub fn uninstall(&mut self) {
        if let Some(id) = self.id.take() {
            low_level::unregister(id);
        }
    }
}

#[cfg(unix)]
impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Re-delivers SIGINT with the default disposition so the parent shell sees
/// a signal exit. Returns only if the default action did not terminate the
/// process.
#[cfg(unix)]
pub fn reraise_interrupt() -> io::Result<()> {
    low_level::emulate_default_handler(SIGINT)
}

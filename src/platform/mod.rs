//! Process-level integrations: terminal probing and interrupt handling.

pub mod interrupt;

use std::io::IsTerminal;

#[cfg(unix)]
pub use interrupt::{reraise_interrupt, InterruptGuard};

#[must_use]
pub fn stdin_is_terminal() -> bool {
    std::io::stdin().is_terminal()
}

#[must_use]
pub fn stderr_is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

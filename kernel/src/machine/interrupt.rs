//! Interrupt priority control
//!
//! TLB mutation must run with interrupts masked. The machine exposes a
//! raise-to-highest / restore pair; this module wraps it in a scoped guard so
//! the restore happens on every exit path, error paths included.

use super::backend;

/// Scoped interrupt-priority raise.
///
/// Constructed by [`raise`]; dropping the guard restores the priority level
/// that was in effect before the raise. Guards nest.
#[must_use = "dropping the guard re-enables interrupts"]
pub struct IplGuard {
    old: u32,
}

/// Raise the interrupt priority to the highest level.
pub fn raise() -> IplGuard {
    IplGuard {
        old: backend::raise_ipl(),
    }
}

impl Drop for IplGuard {
    fn drop(&mut self) {
        backend::restore_ipl(self.old);
    }
}

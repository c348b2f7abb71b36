//! Current-process hook
//!
//! The process layer proper lives outside the VM core. This module keeps the
//! one piece the VM needs from it: which address space is on the CPU right
//! now. Fault handling and activation consult it; the process layer installs
//! and removes spaces as it switches.
//!
//! The machine is uniprocessor, so a single slot suffices.

use spin::Mutex;

use crate::vm::AddressSpace;

static CURRENT: Mutex<Option<AddressSpace>> = Mutex::new(None);

/// Install `space` as the current address space, returning the previous one.
///
/// Passing `None` detaches the current space (kernel-only context).
pub fn set_addrspace(space: Option<AddressSpace>) -> Option<AddressSpace> {
    core::mem::replace(&mut *CURRENT.lock(), space)
}

/// Run `f` against the current address space, if any.
///
/// The slot stays locked for the duration of `f`, so the space cannot be
/// switched out from under a fault in progress.
pub fn with_addrspace<R>(f: impl FnOnce(Option<&mut AddressSpace>) -> R) -> R {
    f(CURRENT.lock().as_mut())
}

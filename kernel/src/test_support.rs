//! Shared test scaffolding
//!
//! The mock machine and the current-address-space slot are process-global,
//! so tests that touch either must run one at a time against a freshly
//! reset machine. [`machine_guard`] is the one entry point: it serializes
//! the test, detaches any address space a previous test left behind (letting
//! it release its frames into the old pool state), and then resets the
//! machine.

use spin::MutexGuard;

use crate::machine::mock;
use crate::proc;

pub(crate) fn machine_guard() -> MutexGuard<'static, ()> {
    let guard = mock::lock();
    // Drop a leftover current space first so its frames are freed while the
    // pool still remembers them
    proc::set_addrspace(None);
    mock::reset();
    guard
}

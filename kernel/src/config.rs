//! Kernel configuration
//!
//! Compile-time constants for the VM subsystem. Anything a port would tune
//! lives here rather than being scattered through the modules that use it.

use crate::memory::address::PAGE_SIZE;

/// Pages in the initial user stack region.
pub const USERSTACK_PAGES: usize = 16;

/// Byte length of the user stack region, ending at the top of user VA.
pub const USERSTACK_SIZE: u32 = (USERSTACK_PAGES * PAGE_SIZE) as u32;

/// Kernel heap span. Carved out of the kernel image; see `memory::heap`.
pub const KERNEL_HEAP_SIZE: usize = 512 * 1024;

/// Frames in the mock machine's RAM pool (host builds only).
#[cfg(any(test, feature = "mock"))]
pub const MOCK_RAM_FRAMES: usize = 256;

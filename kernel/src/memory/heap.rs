//! Kernel heap allocator
//!
//! Dynamic allocation for the kernel (`Box`, `Vec`, and friends) over a fixed
//! region carved out of the kernel image, using `linked_list_allocator`
//! behind Rust's `GlobalAlloc` trait.
//!
//! Host builds (tests and the `mock` feature) run under the host allocator
//! instead; the global-allocator registration only happens on target builds.
//!
//! There is deliberately no allocation-failure handler here: the VM core
//! performs its heap allocations fallibly and reports exhaustion as an error
//! rather than aborting.

use core::ptr::addr_of_mut;

use linked_list_allocator::LockedHeap;

use crate::config::KERNEL_HEAP_SIZE;

#[repr(align(16))]
struct HeapRegion([u8; KERNEL_HEAP_SIZE]);

/// Heap memory region, part of the kernel image
static mut HEAP_MEMORY: HeapRegion = HeapRegion([0; KERNEL_HEAP_SIZE]);

#[cfg_attr(not(any(test, feature = "mock")), global_allocator)]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initialize the kernel heap.
///
/// # Safety
/// - Must be called exactly once during boot
/// - Must be called before any heap allocation
pub unsafe fn init() {
    let start = addr_of_mut!(HEAP_MEMORY) as *mut u8;
    ALLOCATOR.lock().init(start, KERNEL_HEAP_SIZE);
}

/// Get the amount of free heap memory.
pub fn free_memory() -> usize {
    ALLOCATOR.lock().free()
}

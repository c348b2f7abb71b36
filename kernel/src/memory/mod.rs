//! Memory management subsystem
//!
//! This module provides the memory infrastructure the VM core builds on:
//! - Type-safe address handling (PhysAddr vs VirtAddr, KSEG0 conversion)
//! - The frame wrapper over the kernel-page allocator
//! - Kernel heap allocation
//!
//! # Frame wrapper
//!
//! User pages come from the machine's kernel-page allocator one frame at a
//! time. The wrapper guarantees every frame it hands out is zero-filled and
//! exclusively owned by the caller until released; the physical address is
//! recovered from the KSEG0 alias by a constant bit transform.

pub mod address;
pub mod heap;

pub use address::{PhysAddr, VirtAddr, PAGE_FRAME, PAGE_SIZE, USERSTACK};

use crate::machine;

/// Allocate one zero-filled physical frame.
///
/// Returns the frame's KSEG0 virtual address and its physical address, or
/// `None` when the physical allocator is exhausted.
pub fn alloc_frame() -> Option<(VirtAddr, PhysAddr)> {
    let kvaddr = machine::alloc_kpages(1)?;
    unsafe {
        core::ptr::write_bytes(machine::frame_base(kvaddr), 0, PAGE_SIZE);
    }
    Some((kvaddr, PhysAddr::from_kvaddr(kvaddr)))
}

/// Release a frame previously obtained from [`alloc_frame`].
pub fn free_frame(kvaddr: VirtAddr) {
    machine::free_kpages(kvaddr);
}

/// Copy a whole frame's contents, byte for byte.
///
/// Both addresses must name live frames owned by the caller.
pub fn copy_frame(dst: VirtAddr, src: VirtAddr) {
    unsafe {
        core::ptr::copy_nonoverlapping(
            machine::frame_base(src),
            machine::frame_base(dst),
            PAGE_SIZE,
        );
    }
}

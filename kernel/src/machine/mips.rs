//! Real machine backend
//!
//! Bindings to the collaborators the kernel image links against: the
//! assembly TLB routines, the interrupt layer's priority save/restore, the
//! physical allocator's kernel-page interface, and the console driver's
//! blocking byte output.
//!
//! None of these are implemented here. The VM core treats them as black
//! boxes; see `machine::mock` for the host-side stand-ins.

use crate::memory::address::VirtAddr;

mod ffi {
    extern "C" {
        pub fn tlb_write(entryhi: u32, entrylo: u32, index: u32);
        pub fn tlb_random(entryhi: u32, entrylo: u32);
        pub fn splhigh() -> u32;
        pub fn splx(level: u32);
        pub fn alloc_kpages(npages: u32) -> u32;
        pub fn free_kpages(addr: u32);
        pub fn putch(ch: u32);
    }
}

pub(crate) fn tlb_write(entryhi: u32, entrylo: u32, slot: usize) {
    unsafe { ffi::tlb_write(entryhi, entrylo, slot as u32) }
}

pub(crate) fn tlb_random(entryhi: u32, entrylo: u32) {
    unsafe { ffi::tlb_random(entryhi, entrylo) }
}

pub(crate) fn raise_ipl() -> u32 {
    unsafe { ffi::splhigh() }
}

pub(crate) fn restore_ipl(level: u32) {
    unsafe { ffi::splx(level) }
}

/// Allocate `npages` contiguous kernel-mapped pages.
///
/// Returns the KSEG0 virtual address of the first page, or `None` when the
/// physical allocator is exhausted.
pub(crate) fn alloc_kpages(npages: usize) -> Option<VirtAddr> {
    let addr = unsafe { ffi::alloc_kpages(npages as u32) };
    if addr == 0 {
        None
    } else {
        Some(VirtAddr::new(addr))
    }
}

/// Release pages previously obtained from [`alloc_kpages`].
pub(crate) fn free_kpages(kvaddr: VirtAddr) {
    unsafe { ffi::free_kpages(kvaddr.as_u32()) }
}

/// Byte pointer behind a KSEG0 kernel virtual address.
///
/// KSEG0 addresses are usable directly; the cast is the whole translation.
pub(crate) fn frame_base(kvaddr: VirtAddr) -> *mut u8 {
    kvaddr.as_u32() as usize as *mut u8
}

pub(crate) fn console_put(byte: u8) {
    unsafe { ffi::putch(byte as u32) }
}

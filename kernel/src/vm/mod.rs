//! Virtual memory subsystem
//!
//! The demand-paged VM core: address spaces made of permission-tagged
//! regions and a sparse two-level page table, bound to the hardware by the
//! TLB-miss fault handler.
//!
//! # Design
//! - Pages are allocated on first touch, never up front. Defining a region
//!   costs one list node; the frames arrive fault by fault.
//! - Page-table leaves are hardware-ready EntryLo words, so a refill copies
//!   one word into the TLB with no translation.
//! - Every operation either completes or leaves observable state untouched:
//!   a failed fault never writes the TLB, a failed copy releases everything
//!   it built.

pub mod addrspace;
pub mod fault;
pub mod page_table;
pub mod region;

#[cfg(test)]
mod tests;

pub use addrspace::{activate, deactivate, AddressSpace};
pub use fault::{vm_fault, vm_fault_raw, FaultType};
pub use page_table::PageTable;
pub use region::{Region, RegionFlags};

use crate::klog;

/// VM subsystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// An allocation failed (frame, table level, region node, address space)
    OutOfMemory,

    /// The address is outside every region, the region denies the access,
    /// or there is no process context to resolve it against
    BadAddress,

    /// A store reached a page whose entry is not writable
    ReadOnly,

    /// Malformed request (unknown fault code, occupied page-table slot,
    /// double table creation)
    InvalidArgument,
}

/// Initialize the VM subsystem.
///
/// Called once during boot, before the first address space is created.
pub fn vm_bootstrap() {
    // Host builds run under the host allocator; only target builds own a heap.
    #[cfg(not(any(test, feature = "mock")))]
    unsafe {
        crate::memory::heap::init();
    }

    klog!(
        Info,
        "vm: ready ({} KiB kernel heap free, {} TLB slots)",
        crate::memory::heap::free_memory() / 1024,
        crate::machine::tlb::NUM_TLB
    );
}

/// TLB shootdown request from another processor.
///
/// The machine is uniprocessor in this configuration; distributed TLB
/// coherence is not implemented, and a request to do it is fatal.
pub fn vm_tlbshootdown() -> ! {
    panic!("vm: tried to do tlb shootdown?!");
}

//! TLB-miss fault handling
//!
//! The trap vector lands here when the hardware cannot translate a user
//! access. A miss on an address inside a defined region is the demand-paging
//! path: allocate a zeroed frame, enter it into the page table, and refill
//! the TLB. Everything else is an error reported back to the trap framework.
//!
//! The handler never partially updates the TLB: all page-table and region
//! work happens first, and the single hardware write goes out with
//! interrupts masked. Faults never change regions.

use crate::machine::{interrupt, tlb};
use crate::memory::VirtAddr;
use crate::proc;

use super::VmError;

/// Kind of translation fault, as decoded by the trap vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// A load missed in the TLB
    Read,

    /// A store missed in the TLB
    Write,

    /// A store hit an entry whose DIRTY (writable) bit is clear
    ReadOnly,
}

impl FaultType {
    /// Decode the raw fault code the trap vector passes in.
    pub fn from_raw(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Read),
            1 => Some(Self::Write),
            2 => Some(Self::ReadOnly),
            _ => None,
        }
    }
}

/// Handle a translation fault at `vaddr`.
///
/// On success the TLB holds a valid entry for the faulting page and the user
/// instruction can be retried. On error the TLB is untouched and the caller
/// delivers the failure to the faulting process.
pub fn vm_fault(fault: FaultType, vaddr: VirtAddr) -> Result<(), VmError> {
    // A store to a non-writable page: no copy-on-write here, so it is fatal
    // to the operation
    if fault == FaultType::ReadOnly {
        return Err(VmError::ReadOnly);
    }

    if vaddr.is_null() {
        return Err(VmError::BadAddress);
    }

    proc::with_addrspace(|space| {
        let space = space.ok_or(VmError::BadAddress)?;
        let (entryhi, entrylo) = space.resolve_fault(fault, vaddr)?;

        let _ipl = interrupt::raise();
        tlb::random(entryhi, entrylo);
        Ok(())
    })
}

/// Trap-vector entry: raw fault code plus raw faulting address.
///
/// Unknown codes are rejected without consulting the address space.
pub fn vm_fault_raw(code: u32, vaddr: u32) -> Result<(), VmError> {
    let fault = FaultType::from_raw(code).ok_or(VmError::InvalidArgument)?;
    vm_fault(fault, VirtAddr::new(vaddr))
}

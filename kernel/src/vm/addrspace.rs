//! Address spaces
//!
//! An address space is the per-process virtual memory context: the region
//! list, the page table, and the fixed user stack base. It exclusively owns
//! both structures, and through the page table every frame mapped for the
//! process; dropping the space releases the lot.
//!
//! Activation binds a space to the CPU. The machine has no address-space
//! tags in its TLB, so activation simply invalidates every slot; the cost is
//! accepted in exchange for not managing ASIDs. Deactivation does the same
//! flush, and `complete_load` relies on it to shed TLB entries that were
//! cached with load-phase writability.

use crate::config::USERSTACK_SIZE;
use crate::machine::tlb::{self, TLBHI_VPAGE};
use crate::memory::address::USERSTACK;
use crate::memory::VirtAddr;
use crate::proc;

use super::fault::FaultType;
use super::page_table::PageTable;
use super::region::{RegionFlags, RegionList};
use super::VmError;

/// Per-process virtual memory context
pub struct AddressSpace {
    regions: RegionList,
    page_table: PageTable,

    /// Top of the user stack; fixed at creation
    stack_base: VirtAddr,
}

impl AddressSpace {
    /// Create an empty address space: no regions, no mappings.
    pub fn new() -> Result<Self, VmError> {
        Ok(Self {
            regions: RegionList::new(),
            page_table: PageTable::new()?,
            stack_base: USERSTACK,
        })
    }

    /// Duplicate this space for a forked process.
    ///
    /// Regions are value-copied; the page table is deep-copied, so every
    /// resident page ends up in a fresh frame with identical contents and
    /// permission bits. On failure the partial duplicate is released in
    /// full before the error returns.
    pub fn try_clone(&self) -> Result<Self, VmError> {
        Ok(Self {
            regions: self.regions.try_clone()?,
            page_table: self.page_table.try_clone()?,
            stack_base: self.stack_base,
        })
    }

    /// Define a region of `memsize` bytes at `vaddr` with the given
    /// permissions. See [`RegionList::define`] for alignment rules.
    pub fn define_region(
        &mut self,
        vaddr: VirtAddr,
        memsize: u32,
        flags: RegionFlags,
    ) -> Result<(), VmError> {
        self.regions.define(vaddr, memsize, flags)
    }

    /// Define the user stack region and return the initial stack pointer.
    ///
    /// The stack occupies the top of user VA, growing down from the stack
    /// base; the returned pointer is the base itself.
    pub fn define_stack(&mut self) -> Result<VirtAddr, VmError> {
        let bottom = VirtAddr::new(self.stack_base.as_u32() - USERSTACK_SIZE);
        self.regions.define(
            bottom,
            USERSTACK_SIZE,
            RegionFlags::READ | RegionFlags::WRITE | RegionFlags::EXEC,
        )?;
        Ok(self.stack_base)
    }

    /// Enter the load phase: every region becomes read/write so the loader
    /// can fill read-only segments. The previous permissions are saved.
    pub fn prepare_load(&mut self) {
        self.regions.save_and_force_writable();
    }

    /// Leave the load phase: restore every region's saved permissions, then
    /// flush the TLB so mappings cached with load-phase writability are shed.
    ///
    /// Pages already resident keep the writable bit baked into their table
    /// entry; the flush only guarantees the *TLB* forgets, so a later store
    /// through such a page will be re-faulted and re-loaded from the table.
    pub fn complete_load(&mut self) {
        self.regions.restore();
        tlb::flush_all();
    }

    /// Top of the user stack
    pub fn stack_base(&self) -> VirtAddr {
        self.stack_base
    }

    /// The page-table entry mapping `vaddr`, if the page is resident.
    pub fn lookup(&self, vaddr: VirtAddr) -> Option<u32> {
        let page = vaddr.page_align_down();
        self.page_table.lookup(page.l1_index(), page.l2_index())
    }

    pub(crate) fn regions(&self) -> &RegionList {
        &self.regions
    }

    /// Resolve a TLB miss against this space.
    ///
    /// Returns the (EntryHi, EntryLo) pair to load, installing a fresh
    /// zeroed frame first if the page is not yet resident. Pure with respect
    /// to the TLB: the caller does the hardware write, and no failure path
    /// here has touched it.
    pub(crate) fn resolve_fault(
        &mut self,
        fault: FaultType,
        vaddr: VirtAddr,
    ) -> Result<(u32, u32), VmError> {
        let page = vaddr.page_align_down();
        let msb = page.l1_index();
        let lsb = page.l2_index();

        let entrylo = match self.page_table.lookup(msb, lsb) {
            Some(entry) => entry,
            None => {
                let region = self.regions.find(page).ok_or(VmError::BadAddress)?;
                let writable = region.flags().contains(RegionFlags::WRITE);
                if fault == FaultType::Write && !writable {
                    return Err(VmError::BadAddress);
                }
                self.page_table.install(msb, lsb, writable)?
            }
        };

        Ok((page.as_u32() & TLBHI_VPAGE, entrylo))
    }
}

/// Make the current process's address space live on the CPU.
///
/// Invalidates every TLB slot, with interrupts masked for the sweep. A
/// kernel-only thread (no current space) leaves the TLB alone.
pub fn activate() {
    proc::with_addrspace(|space| {
        if space.is_some() {
            tlb::flush_all();
        }
    });
}

/// Unbind the outgoing address space.
///
/// With no ASIDs to retire this is the same full flush as [`activate`].
pub fn deactivate() {
    activate();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::mock;
    use crate::memory::address::USERSPACE_TOP;

    #[test]
    fn test_empty_space_is_free_to_destroy() {
        let _gate = crate::test_support::machine_guard();

        let space = AddressSpace::new().unwrap();
        drop(space);
        assert_eq!(mock::total_allocs(), 0);
        assert_eq!(mock::frames_in_use(), 0);
    }

    #[test]
    fn test_define_stack_returns_stack_pointer() {
        let _gate = crate::test_support::machine_guard();

        let mut space = AddressSpace::new().unwrap();
        let sp = space.define_stack().unwrap();
        assert_eq!(sp, USERSTACK);

        // The whole stack span is mapped writable, ending at the top of
        // user VA
        let top_page = VirtAddr::new(USERSPACE_TOP - 0x1000);
        let region = space.regions().find(top_page).unwrap();
        assert_eq!(region.size(), USERSTACK_SIZE);
        assert!(region.flags().contains(RegionFlags::WRITE));
        assert!(space.regions().find(VirtAddr::new(USERSPACE_TOP - USERSTACK_SIZE - 0x1000)).is_none());
    }

    #[test]
    fn test_resolve_fault_outside_regions() {
        let _gate = crate::test_support::machine_guard();

        let mut space = AddressSpace::new().unwrap();
        assert_eq!(
            space.resolve_fault(FaultType::Read, VirtAddr::new(0x0040_0000)),
            Err(VmError::BadAddress)
        );
        assert_eq!(mock::total_allocs(), 0);
    }
}

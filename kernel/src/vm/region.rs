//! Address-space regions
//!
//! A region is a contiguous, page-aligned span of user virtual addresses
//! with uniform permissions. An address space keeps an unordered collection
//! of them; the fault handler scans it to decide whether a miss is a lazy
//! page waiting to be allocated or a genuine bad access.
//!
//! Regions carry two permission sets: the live one, and a saved copy that
//! the load phase uses. While an executable is being loaded the live flags
//! are forced read/write so the loader can fill read-only segments; the
//! saved copy restores them afterwards.

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::memory::address::{VirtAddr, PAGE_FRAME, PAGE_SIZE, USERSPACE_TOP};
use super::VmError;

bitflags! {
    /// Region permission flags.
    ///
    /// The bit values follow the ELF program-header convention, since that
    /// is what the loader hands in. The hardware writable bit is derived
    /// from `WRITE` at install time, never stored here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionFlags: u32 {
        /// Instruction fetch permitted
        const EXEC = 1 << 0;

        /// Stores permitted
        const WRITE = 1 << 1;

        /// Loads permitted
        const READ = 1 << 2;
    }
}

/// One defined span of user virtual addresses
#[derive(Debug, Clone, Copy)]
pub struct Region {
    /// Page-aligned start address
    vbase: VirtAddr,

    /// Page-aligned byte length
    size: u32,

    /// Live permissions, consulted on every fault
    flags: RegionFlags,

    /// Permissions to restore once loading completes
    saved_flags: RegionFlags,
}

impl Region {
    fn new(vbase: VirtAddr, size: u32, flags: RegionFlags) -> Self {
        Self {
            vbase,
            size,
            flags,
            saved_flags: flags,
        }
    }

    /// Page-aligned start address
    pub fn vbase(&self) -> VirtAddr {
        self.vbase
    }

    /// Page-aligned byte length
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Live permissions
    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    /// Check whether `vaddr` falls inside this region
    pub fn contains(&self, vaddr: VirtAddr) -> bool {
        vaddr >= self.vbase && vaddr.as_u32() < self.vbase.as_u32() + self.size
    }
}

/// The regions of one address space.
///
/// Definition order is preserved newest-first and decides lookup: ranges may
/// overlap (the loader relies on being able to define adjacent segments
/// without the kernel second-guessing it), and the most recently defined
/// match wins.
#[derive(Debug)]
pub struct RegionList {
    regions: Vec<Region>,
}

impl RegionList {
    /// Create an empty list
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Define a region covering `memsize` bytes starting at `vaddr`.
    ///
    /// Both ends are page-aligned: the base is rounded down and the length
    /// grown to cover the original span. The region must fit below the
    /// kernel boundary. No overlap check is performed.
    pub fn define(
        &mut self,
        vaddr: VirtAddr,
        memsize: u32,
        flags: RegionFlags,
    ) -> Result<(), VmError> {
        let spill = vaddr.as_u32() & !PAGE_FRAME;
        let vbase = vaddr.page_align_down();
        let size = memsize
            .checked_add(spill)
            .and_then(|s| s.checked_add(PAGE_SIZE as u32 - 1))
            .ok_or(VmError::BadAddress)?
            & PAGE_FRAME;

        let end = vbase
            .as_u32()
            .checked_add(size)
            .ok_or(VmError::BadAddress)?;
        if end > USERSPACE_TOP {
            return Err(VmError::BadAddress);
        }

        self.regions
            .try_reserve(1)
            .map_err(|_| VmError::OutOfMemory)?;
        self.regions.insert(0, Region::new(vbase, size, flags));
        Ok(())
    }

    /// Find the first region containing `vaddr`, newest definition first
    pub fn find(&self, vaddr: VirtAddr) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(vaddr))
    }

    /// Save every region's permissions and force them read/write, so the
    /// loader can fill read-only segments
    pub fn save_and_force_writable(&mut self) {
        for region in &mut self.regions {
            region.saved_flags = region.flags;
            region.flags = RegionFlags::READ | RegionFlags::WRITE;
        }
    }

    /// Restore every region's saved permissions
    pub fn restore(&mut self) {
        for region in &mut self.regions {
            region.flags = region.saved_flags;
        }
    }

    /// Value-copy of the whole list
    pub fn try_clone(&self) -> Result<Self, VmError> {
        let mut regions = Vec::new();
        regions
            .try_reserve_exact(self.regions.len())
            .map_err(|_| VmError::OutOfMemory)?;
        regions.extend_from_slice(&self.regions);
        Ok(Self { regions })
    }

    /// Iterate over the regions, newest definition first
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}

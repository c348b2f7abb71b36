//! Two-level page table
//!
//! Maps user virtual pages to physical frames for one address space. The
//! table is a sparse tree: a 2048-slot first level indexed by vaddr bits
//! [31:21], where each populated slot owns a 512-entry second level indexed
//! by bits [20:12]. Second levels are allocated lazily, on the first install
//! into their first-level slot, so untouched stretches of the address space
//! cost nothing.
//!
//! Leaves are raw EntryLo words, exactly what the hardware wants:
//! `(frame << 12) | DIRTY | VALID`, with zero meaning "no mapping". The
//! writable (DIRTY) bit is baked in when the entry is installed, from the
//! owning region's write permission at that moment.
//!
//! The table exclusively owns every frame its entries name. Copying
//! duplicates each resident frame; dropping the table releases them all.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::alloc::Layout;

use crate::machine::tlb::{TLBLO_DIRTY, TLBLO_VALID};
use crate::memory::{self, PhysAddr, VirtAddr, PAGE_FRAME};
use super::VmError;

/// First-level slots (vaddr bits [31:21])
pub const L1_PT_SIZE: usize = 2048;

/// Second-level entries (vaddr bits [20:12])
pub const L2_PT_SIZE: usize = 512;

/// A second-level table: EntryLo words, zero = absent
type L2Table = [u32; L2_PT_SIZE];

/// Sparse two-level page table owning its frames
#[derive(Debug)]
pub struct PageTable {
    l1: Box<[Option<Box<L2Table>>]>,
}

impl PageTable {
    /// Create an empty table: 2048 first-level slots, none populated.
    pub fn new() -> Result<Self, VmError> {
        let mut slots: Vec<Option<Box<L2Table>>> = Vec::new();
        slots
            .try_reserve_exact(L1_PT_SIZE)
            .map_err(|_| VmError::OutOfMemory)?;
        for _ in 0..L1_PT_SIZE {
            slots.push(None);
        }
        Ok(Self {
            l1: slots.into_boxed_slice(),
        })
    }

    /// Fallible zeroed second-level allocation.
    ///
    /// Goes through the raw allocator so heap exhaustion surfaces as an
    /// error instead of aborting the kernel.
    fn new_l2() -> Result<Box<L2Table>, VmError> {
        let layout = Layout::new::<L2Table>();
        let ptr = unsafe { alloc::alloc::alloc_zeroed(layout) }.cast::<L2Table>();
        if ptr.is_null() {
            return Err(VmError::OutOfMemory);
        }
        Ok(unsafe { Box::from_raw(ptr) })
    }

    /// Populate the second level under `msb`.
    ///
    /// Creating a level that already exists is a caller bug and is rejected.
    pub fn l2_create(&mut self, msb: usize) -> Result<(), VmError> {
        debug_assert!(msb < L1_PT_SIZE);
        if self.l1[msb].is_some() {
            return Err(VmError::InvalidArgument);
        }
        self.l1[msb] = Some(Self::new_l2()?);
        Ok(())
    }

    /// Install a mapping at (`msb`, `lsb`), allocating a zeroed frame.
    ///
    /// The slot must be empty. `writable` bakes the hardware DIRTY bit into
    /// the entry; it is not revisited if the region's permissions change
    /// later. Returns the EntryLo word written.
    pub fn install(&mut self, msb: usize, lsb: usize, writable: bool) -> Result<u32, VmError> {
        debug_assert!(msb < L1_PT_SIZE && lsb < L2_PT_SIZE);
        if self.l1[msb].is_none() {
            self.l2_create(msb)?;
        }
        let l2 = self.l1[msb].as_deref_mut().unwrap();
        if l2[lsb] != 0 {
            return Err(VmError::InvalidArgument);
        }

        let (_kvaddr, paddr) = memory::alloc_frame().ok_or(VmError::OutOfMemory)?;
        let mut entry = (paddr.as_u32() & PAGE_FRAME) | TLBLO_VALID;
        if writable {
            entry |= TLBLO_DIRTY;
        }
        l2[lsb] = entry;
        Ok(entry)
    }

    /// Look up the entry at (`msb`, `lsb`), if one is present.
    pub fn lookup(&self, msb: usize, lsb: usize) -> Option<u32> {
        debug_assert!(msb < L1_PT_SIZE && lsb < L2_PT_SIZE);
        match self.l1[msb] {
            Some(ref l2) if l2[lsb] != 0 => Some(l2[lsb]),
            _ => None,
        }
    }

    /// Deep copy: same set of present entries, same permission bits, fresh
    /// frames holding byte-identical contents.
    ///
    /// If any allocation fails part way, the partially built table is
    /// dropped on the way out, releasing everything it acquired.
    pub fn try_clone(&self) -> Result<Self, VmError> {
        let mut copy = Self::new()?;
        for (msb, slot) in self.l1.iter().enumerate() {
            let Some(src_l2) = slot.as_deref() else {
                continue;
            };
            copy.l2_create(msb)?;
            let dst_l2 = copy.l1[msb].as_deref_mut().unwrap();
            for (lsb, &entry) in src_l2.iter().enumerate() {
                if entry == 0 {
                    continue;
                }
                let (dst_kvaddr, dst_paddr) =
                    memory::alloc_frame().ok_or(VmError::OutOfMemory)?;
                // The entry must land in the table before anything else can
                // fail, so the frame is owned (and thus freed) either way.
                dst_l2[lsb] =
                    (dst_paddr.as_u32() & PAGE_FRAME) | (entry & TLBLO_DIRTY) | TLBLO_VALID;
                let src_kvaddr = VirtAddr::from_paddr(PhysAddr::new(entry & PAGE_FRAME));
                memory::copy_frame(dst_kvaddr, src_kvaddr);
            }
        }
        Ok(copy)
    }
}

impl Drop for PageTable {
    fn drop(&mut self) {
        for slot in self.l1.iter_mut() {
            let Some(l2) = slot.as_deref_mut() else {
                continue;
            };
            for entry in l2.iter_mut() {
                if *entry != 0 {
                    memory::free_frame(VirtAddr::from_paddr(PhysAddr::new(*entry & PAGE_FRAME)));
                    *entry = 0;
                }
            }
        }
    }
}

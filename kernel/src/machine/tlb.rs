//! TLB entry encoding and mutation
//!
//! Each TLB entry is an (EntryHi, EntryLo) pair:
//! - EntryHi holds the virtual page tag in bits [31:12].
//! - EntryLo holds the physical frame number in bits [31:12], plus the
//!   DIRTY bit (the page is writable by the user; clearing it makes stores
//!   trap as read-only faults) and the VALID bit.
//!
//! The page table stores EntryLo words directly, so the refill path copies a
//! word out of the table and into the hardware with no translation.
//!
//! Callers must hold the interrupt-priority raise (see `machine::interrupt`)
//! across every call that touches the hardware.

use super::{backend, interrupt};

/// Number of TLB entries the hardware provides
pub const NUM_TLB: usize = 64;

/// EntryLo: entry is valid
pub const TLBLO_VALID: u32 = 0x0000_0200;

/// EntryLo: page is writable by the user ("dirty" in the hardware sense)
pub const TLBLO_DIRTY: u32 = 0x0000_0400;

/// EntryHi: mask selecting the virtual page tag
pub const TLBHI_VPAGE: u32 = 0xFFFF_F000;

/// EntryHi value that can never match a translation, distinct per slot.
///
/// The tags are KSEG0 page numbers; KSEG0 is direct-mapped and never looked
/// up in the TLB, and spreading the slot number into the tag keeps the
/// invalidated TLB free of duplicate tags.
pub const fn invalid_hi(slot: usize) -> u32 {
    (0x8_0000 + slot as u32) << 12
}

/// EntryLo value for an invalidated slot (VALID clear).
pub const fn invalid_lo() -> u32 {
    0
}

/// Write one TLB slot.
pub fn write(entryhi: u32, entrylo: u32, slot: usize) {
    debug_assert!(slot < NUM_TLB);
    backend::tlb_write(entryhi, entrylo, slot);
}

/// Write a TLB slot chosen by the hardware's random-replacement register.
pub fn random(entryhi: u32, entrylo: u32) {
    backend::tlb_random(entryhi, entrylo);
}

/// Invalidate every TLB slot.
///
/// Raises the interrupt priority for the duration of the sweep.
pub fn flush_all() {
    let _ipl = interrupt::raise();
    for slot in 0..NUM_TLB {
        write(invalid_hi(slot), invalid_lo(), slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tags_distinct() {
        for a in 0..NUM_TLB {
            for b in (a + 1)..NUM_TLB {
                assert_ne!(invalid_hi(a), invalid_hi(b));
            }
        }
    }

    #[test]
    fn test_invalid_lo_not_valid() {
        assert_eq!(invalid_lo() & TLBLO_VALID, 0);
    }
}

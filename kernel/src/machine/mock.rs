//! Mock machine backend
//!
//! A host-side stand-in for the real machine, mirroring the function surface
//! of `machine::mips`:
//! - a RAM pool carved into 4 KiB frames with a bitmap allocator and
//!   cumulative allocation counters, standing in for the kernel-page
//!   allocator;
//! - a 64-slot TLB array plus a log of every write, with random replacement
//!   made deterministic (round-robin over the non-wired slots);
//! - a tracked interrupt-priority level. TLB mutation asserts that the
//!   priority is raised, so masking bugs fail loudly in tests.
//!
//! Frames live inside the pool, so page contents are real: the frame wrapper
//! zeroes and copies actual bytes, and tests can inspect them with
//! [`peek`]/[`poke`]. Freshly allocated frames are filled with a poison
//! pattern to catch paths that skip zeroing.

use alloc::vec;
use alloc::vec::Vec;
use spin::{Mutex, MutexGuard, Once};

use super::tlb::NUM_TLB;
use crate::config::MOCK_RAM_FRAMES;
use crate::memory::address::{PhysAddr, VirtAddr, PAGE_SIZE};

/// Physical base of the mock RAM pool
const RAM_BASE: u32 = 0x0010_0000;

/// Fill pattern for freshly allocated frames
const POISON: u8 = 0xA5;

/// TLB slots below this index are wired; random replacement avoids them
const WIRED_SLOTS: usize = 8;

struct MockMachine {
    /// Backing store for every frame in the pool
    ram: Vec<u8>,

    /// Frame allocation bitmap (1 = allocated, 0 = free)
    bitmap: [u64; MOCK_RAM_FRAMES / 64],

    /// Number of free frames remaining
    free_frames: usize,

    /// Cumulative allocation / release counts since the last reset
    total_allocs: usize,
    total_frees: usize,

    /// TLB contents: (EntryHi, EntryLo) per slot
    tlb: [(u32, u32); NUM_TLB],

    /// Every TLB write since the last reset: (EntryHi, EntryLo, slot)
    writes: Vec<(u32, u32, usize)>,

    /// Round-robin cursor standing in for the hardware random register
    next_victim: usize,

    /// Current interrupt priority (0 = enabled, 1 = masked)
    ipl: u32,

    /// Bytes sunk by the debug console
    console: Vec<u8>,
}

impl MockMachine {
    fn new() -> Self {
        Self {
            ram: vec![0; MOCK_RAM_FRAMES * PAGE_SIZE],
            bitmap: [0; MOCK_RAM_FRAMES / 64],
            free_frames: MOCK_RAM_FRAMES,
            total_allocs: 0,
            total_frees: 0,
            tlb: [(0, 0); NUM_TLB],
            writes: Vec::new(),
            next_victim: 0,
            ipl: 0,
            console: Vec::new(),
        }
    }

    fn frame_index(&self, kvaddr: VirtAddr) -> usize {
        let paddr = PhysAddr::from_kvaddr(kvaddr).as_u32();
        assert!(
            paddr >= RAM_BASE && (paddr - RAM_BASE) < (MOCK_RAM_FRAMES * PAGE_SIZE) as u32,
            "kvaddr outside the mock RAM pool: {:?}",
            kvaddr
        );
        ((paddr - RAM_BASE) as usize) / PAGE_SIZE
    }

    fn is_free(&self, frame: usize) -> bool {
        self.bitmap[frame / 64] & (1u64 << (frame % 64)) == 0
    }

    fn mark_allocated(&mut self, frame: usize) {
        self.bitmap[frame / 64] |= 1u64 << (frame % 64);
    }

    fn mark_free(&mut self, frame: usize) {
        self.bitmap[frame / 64] &= !(1u64 << (frame % 64));
    }

    fn record_write(&mut self, entryhi: u32, entrylo: u32, slot: usize) {
        assert!(self.ipl > 0, "TLB written with interrupts enabled");
        self.tlb[slot] = (entryhi, entrylo);
        self.writes.push((entryhi, entrylo, slot));
    }
}

static MACHINE: Once<Mutex<MockMachine>> = Once::new();

fn machine() -> &'static Mutex<MockMachine> {
    MACHINE.call_once(|| Mutex::new(MockMachine::new()))
}

// ---------------------------------------------------------------------------
// Backend surface (mirrors machine::mips)
// ---------------------------------------------------------------------------

pub(crate) fn tlb_write(entryhi: u32, entrylo: u32, slot: usize) {
    machine().lock().record_write(entryhi, entrylo, slot);
}

pub(crate) fn tlb_random(entryhi: u32, entrylo: u32) {
    let mut m = machine().lock();
    let slot = WIRED_SLOTS + (m.next_victim % (NUM_TLB - WIRED_SLOTS));
    m.next_victim += 1;
    m.record_write(entryhi, entrylo, slot);
}

pub(crate) fn raise_ipl() -> u32 {
    let mut m = machine().lock();
    core::mem::replace(&mut m.ipl, 1)
}

pub(crate) fn restore_ipl(level: u32) {
    machine().lock().ipl = level;
}

pub(crate) fn alloc_kpages(npages: usize) -> Option<VirtAddr> {
    assert_eq!(npages, 1, "the VM core allocates single frames");
    let mut m = machine().lock();
    if m.free_frames == 0 {
        return None;
    }
    for frame in 0..MOCK_RAM_FRAMES {
        if m.is_free(frame) {
            m.mark_allocated(frame);
            m.free_frames -= 1;
            m.total_allocs += 1;
            let start = frame * PAGE_SIZE;
            m.ram[start..start + PAGE_SIZE].fill(POISON);
            let paddr = PhysAddr::new(RAM_BASE + (start as u32));
            return Some(VirtAddr::from_paddr(paddr));
        }
    }
    None
}

pub(crate) fn free_kpages(kvaddr: VirtAddr) {
    let mut m = machine().lock();
    let frame = m.frame_index(kvaddr);
    assert!(!m.is_free(frame), "double free of {:?}", kvaddr);
    m.mark_free(frame);
    m.free_frames += 1;
    m.total_frees += 1;
}

pub(crate) fn frame_base(kvaddr: VirtAddr) -> *mut u8 {
    let mut m = machine().lock();
    let frame = m.frame_index(kvaddr);
    let offset = frame * PAGE_SIZE + kvaddr.page_offset();
    // The pool is never resized, so the pointer stays valid after unlock.
    unsafe { m.ram.as_mut_ptr().add(offset) }
}

pub(crate) fn console_put(byte: u8) {
    machine().lock().console.push(byte);
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

static TEST_GATE: Mutex<()> = Mutex::new(());

/// Serialize tests that touch machine state.
///
/// The machine is process-global; tests that allocate frames, write the TLB,
/// or install a current address space must hold this guard.
pub fn lock() -> MutexGuard<'static, ()> {
    TEST_GATE.lock()
}

/// Return the machine to power-on state: empty pool, invalid TLB, zero
/// counters, interrupts enabled.
pub fn reset() {
    let mut m = machine().lock();
    m.bitmap = [0; MOCK_RAM_FRAMES / 64];
    m.free_frames = MOCK_RAM_FRAMES;
    m.total_allocs = 0;
    m.total_frees = 0;
    m.tlb = [(0, 0); NUM_TLB];
    m.writes.clear();
    m.next_victim = 0;
    m.ipl = 0;
    m.console.clear();
}

/// Frames currently allocated from the pool.
pub fn frames_in_use() -> usize {
    MOCK_RAM_FRAMES - machine().lock().free_frames
}

/// Cumulative frame allocations since the last reset.
pub fn total_allocs() -> usize {
    machine().lock().total_allocs
}

/// Cumulative frame releases since the last reset.
pub fn total_frees() -> usize {
    machine().lock().total_frees
}

/// Every TLB write since the last reset, oldest first.
pub fn tlb_writes() -> Vec<(u32, u32, usize)> {
    machine().lock().writes.clone()
}

/// Snapshot of the TLB contents.
pub fn tlb_entries() -> [(u32, u32); NUM_TLB] {
    machine().lock().tlb
}

/// Everything the debug console has printed since the last reset.
pub fn console_output() -> Vec<u8> {
    machine().lock().console.clone()
}

/// Read one byte of frame memory through its kernel virtual address.
pub fn peek(kvaddr: VirtAddr, offset: usize) -> u8 {
    assert!(offset < PAGE_SIZE);
    let m = machine().lock();
    let frame = m.frame_index(kvaddr);
    m.ram[frame * PAGE_SIZE + offset]
}

/// Write one byte of frame memory through its kernel virtual address.
pub fn poke(kvaddr: VirtAddr, offset: usize, value: u8) {
    assert!(offset < PAGE_SIZE);
    let mut m = machine().lock();
    let frame = m.frame_index(kvaddr);
    m.ram[frame * PAGE_SIZE + offset] = value;
}

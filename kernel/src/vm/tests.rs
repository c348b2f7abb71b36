//! VM Integration Tests
//!
//! End-to-end tests for the VM core against the mock machine: demand paging
//! through `vm_fault`, fork-style address-space duplication, the load phase,
//! and activation. The mock machine's counting allocator and recorded TLB
//! make the resource accounting and hardware interaction observable.

use crate::machine::mock;
use crate::machine::tlb::{invalid_hi, NUM_TLB, TLBLO_DIRTY, TLBLO_VALID};
use crate::memory::{PhysAddr, VirtAddr, PAGE_FRAME};
use crate::proc;
use crate::test_support::machine_guard;
use crate::vm::{
    activate, vm_fault, vm_fault_raw, AddressSpace, FaultType, RegionFlags, VmError,
};

fn frame_of(entry: u32) -> VirtAddr {
    VirtAddr::from_paddr(PhysAddr::new(entry & PAGE_FRAME))
}

fn install_current(space: AddressSpace) {
    proc::set_addrspace(Some(space));
}

fn take_current() -> AddressSpace {
    proc::set_addrspace(None).expect("no current address space")
}

// ========================================================================
// Demand paging through vm_fault
// ========================================================================

#[test]
fn test_read_fault_in_readonly_region_installs_clean_page() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(
            VirtAddr::new(0x0040_0000),
            0x1000,
            RegionFlags::READ | RegionFlags::EXEC,
        )
        .unwrap();
    install_current(space);

    vm_fault(FaultType::Read, VirtAddr::new(0x0040_0010)).unwrap();

    assert_eq!(mock::total_allocs(), 1);
    let writes = mock::tlb_writes();
    assert_eq!(writes.len(), 1);
    let (entryhi, entrylo, _slot) = writes[0];
    assert_eq!(entryhi, 0x0040_0000);
    assert_eq!(entrylo & TLBLO_VALID, TLBLO_VALID);
    assert_eq!(entrylo & TLBLO_DIRTY, 0);

    // The freshly installed page reads as zeroes
    let space = take_current();
    let entry = space.lookup(VirtAddr::new(0x0040_0010)).unwrap();
    assert_eq!(mock::peek(frame_of(entry), 0x10), 0);
}

#[test]
fn test_write_fault_in_readonly_region_rejected() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(
            VirtAddr::new(0x0040_0000),
            0x1000,
            RegionFlags::READ | RegionFlags::EXEC,
        )
        .unwrap();
    install_current(space);

    assert_eq!(
        vm_fault(FaultType::Write, VirtAddr::new(0x0040_0010)),
        Err(VmError::BadAddress)
    );
    assert_eq!(mock::total_allocs(), 0);
    assert!(mock::tlb_writes().is_empty());
}

#[test]
fn test_write_fault_in_writable_region_sets_dirty() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(
            VirtAddr::new(0x0040_0000),
            0x1000,
            RegionFlags::READ | RegionFlags::WRITE,
        )
        .unwrap();
    install_current(space);

    vm_fault(FaultType::Write, VirtAddr::new(0x0040_0abc)).unwrap();

    let writes = mock::tlb_writes();
    assert_eq!(writes.len(), 1);
    let (entryhi, entrylo, _slot) = writes[0];
    assert_eq!(entryhi, 0x0040_0000);
    assert_eq!(entrylo & TLBLO_DIRTY, TLBLO_DIRTY);
}

#[test]
fn test_second_fault_reuses_resident_page() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(
            VirtAddr::new(0x0040_0000),
            0x1000,
            RegionFlags::READ | RegionFlags::WRITE,
        )
        .unwrap();
    install_current(space);

    vm_fault(FaultType::Write, VirtAddr::new(0x0040_0abc)).unwrap();
    vm_fault(FaultType::Read, VirtAddr::new(0x0040_0abc)).unwrap();

    // One frame serves both faults; the second refill reloads the same entry
    assert_eq!(mock::total_allocs(), 1);
    let writes = mock::tlb_writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].1, writes[1].1);
}

#[test]
fn test_fault_outside_any_region_rejected() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(VirtAddr::new(0x0040_0000), 0x1000, RegionFlags::READ)
        .unwrap();
    install_current(space);

    assert_eq!(
        vm_fault(FaultType::Read, VirtAddr::new(0x0050_0000)),
        Err(VmError::BadAddress)
    );
    assert!(mock::tlb_writes().is_empty());
}

// ========================================================================
// Fault-handler entry conditions
// ========================================================================

#[test]
fn test_readonly_fault_is_fatal() {
    let _gate = machine_guard();

    // Rejected before the process context is even consulted
    assert_eq!(
        vm_fault(FaultType::ReadOnly, VirtAddr::new(0x0040_0000)),
        Err(VmError::ReadOnly)
    );
}

#[test]
fn test_null_address_rejected() {
    let _gate = machine_guard();

    let space = AddressSpace::new().unwrap();
    install_current(space);
    assert_eq!(
        vm_fault(FaultType::Read, VirtAddr::new(0)),
        Err(VmError::BadAddress)
    );
}

#[test]
fn test_fault_without_process_context_rejected() {
    let _gate = machine_guard();

    assert_eq!(
        vm_fault(FaultType::Read, VirtAddr::new(0x0040_0000)),
        Err(VmError::BadAddress)
    );
}

#[test]
fn test_unknown_fault_code_rejected() {
    let _gate = machine_guard();

    assert_eq!(vm_fault_raw(7, 0x0040_0000), Err(VmError::InvalidArgument));
    assert!(mock::tlb_writes().is_empty());
}

// ========================================================================
// Fork-style duplication
// ========================================================================

#[test]
fn test_clone_duplicates_coverage_and_contents() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(
            VirtAddr::new(0x0040_0000),
            0x1000,
            RegionFlags::READ | RegionFlags::EXEC,
        )
        .unwrap();
    space
        .define_region(
            VirtAddr::new(0x1000_0000),
            0x2000,
            RegionFlags::READ | RegionFlags::WRITE,
        )
        .unwrap();
    install_current(space);

    vm_fault(FaultType::Read, VirtAddr::new(0x0040_0010)).unwrap();
    vm_fault(FaultType::Write, VirtAddr::new(0x1000_0000)).unwrap();

    let space = take_current();
    let code_entry = space.lookup(VirtAddr::new(0x0040_0000)).unwrap();
    let data_entry = space.lookup(VirtAddr::new(0x1000_0000)).unwrap();
    mock::poke(frame_of(code_entry), 0, 0x11);
    mock::poke(frame_of(data_entry), 0, 0x22);

    let copy = space.try_clone().unwrap();

    // Same coverage, same permission bits, different frames, equal bytes
    let copy_code = copy.lookup(VirtAddr::new(0x0040_0000)).unwrap();
    let copy_data = copy.lookup(VirtAddr::new(0x1000_0000)).unwrap();
    assert!(copy.lookup(VirtAddr::new(0x1000_1000)).is_none());
    assert_ne!(copy_code & PAGE_FRAME, code_entry & PAGE_FRAME);
    assert_ne!(copy_data & PAGE_FRAME, data_entry & PAGE_FRAME);
    assert_eq!(copy_code & TLBLO_DIRTY, 0);
    assert_eq!(copy_data & TLBLO_DIRTY, TLBLO_DIRTY);
    assert_eq!(mock::peek(frame_of(copy_code), 0), 0x11);
    assert_eq!(mock::peek(frame_of(copy_data), 0), 0x22);

    // The copy stays fully functional after the original dies
    drop(space);
    install_current(copy);
    vm_fault(FaultType::Write, VirtAddr::new(0x1000_1000)).unwrap();
    let copy = take_current();
    assert_eq!(mock::peek(frame_of(copy_data), 0), 0x22);

    drop(copy);
    assert_eq!(mock::frames_in_use(), 0);
}

// ========================================================================
// Load phase
// ========================================================================

#[test]
fn test_load_phase_write_then_restore() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(VirtAddr::new(0x0040_0000), 0x2000, RegionFlags::READ)
        .unwrap();

    // Loader path: the read-only segment accepts stores while loading
    space.prepare_load();
    install_current(space);
    vm_fault(FaultType::Write, VirtAddr::new(0x0040_0010)).unwrap();

    let mut space = take_current();
    let entry = space.lookup(VirtAddr::new(0x0040_0000)).unwrap();
    mock::poke(frame_of(entry), 0x10, 0x7F);

    space.complete_load();

    // The restore's flush left every TLB slot invalid again
    for (slot, (entryhi, entrylo)) in mock::tlb_entries().iter().enumerate() {
        assert_eq!(*entryhi, invalid_hi(slot));
        assert_eq!(entrylo & TLBLO_VALID, 0);
    }

    // A store to a page that never became resident obeys the restored
    // permissions
    install_current(space);
    assert_eq!(
        vm_fault(FaultType::Write, VirtAddr::new(0x0040_1000)),
        Err(VmError::BadAddress)
    );

    // The page the loader touched keeps its baked-in writable bit until the
    // space is torn down, so re-faulting it still succeeds
    vm_fault(FaultType::Write, VirtAddr::new(0x0040_0010)).unwrap();
    let space = take_current();
    let entry = space.lookup(VirtAddr::new(0x0040_0000)).unwrap();
    assert_eq!(entry & TLBLO_DIRTY, TLBLO_DIRTY);
    assert_eq!(mock::peek(frame_of(entry), 0x10), 0x7F);
}

// ========================================================================
// Activation
// ========================================================================

#[test]
fn test_activate_without_space_leaves_tlb_alone() {
    let _gate = machine_guard();

    activate();
    assert!(mock::tlb_writes().is_empty());
}

#[test]
fn test_activate_invalidates_every_slot() {
    let _gate = machine_guard();

    install_current(AddressSpace::new().unwrap());
    activate();

    let entries = mock::tlb_entries();
    for (slot, (entryhi, entrylo)) in entries.iter().enumerate() {
        assert_eq!(*entryhi, invalid_hi(slot));
        assert_eq!(entrylo & TLBLO_VALID, 0);
    }
    // Tags are pairwise distinct, so no two slots can conflict
    for a in 0..NUM_TLB {
        for b in (a + 1)..NUM_TLB {
            assert_ne!(entries[a].0, entries[b].0);
        }
    }

    // Activating again is the same flush; the TLB state is unchanged
    activate();
    assert_eq!(mock::tlb_entries(), entries);
}

// ========================================================================
// Teardown accounting
// ========================================================================

#[test]
fn test_destroy_releases_every_frame() {
    let _gate = machine_guard();

    let mut space = AddressSpace::new().unwrap();
    space
        .define_region(
            VirtAddr::new(0x0040_0000),
            0x4000,
            RegionFlags::READ | RegionFlags::WRITE,
        )
        .unwrap();
    space.define_stack().unwrap();
    install_current(space);

    for page in 0..4u32 {
        vm_fault(FaultType::Write, VirtAddr::new(0x0040_0000 + page * 0x1000)).unwrap();
    }
    vm_fault(FaultType::Write, VirtAddr::new(0x7FFF_F000)).unwrap();

    assert_eq!(mock::frames_in_use(), 5);
    drop(take_current());
    assert_eq!(mock::frames_in_use(), 0);
    assert_eq!(mock::total_allocs(), mock::total_frees());
}

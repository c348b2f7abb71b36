//! Tern Virtual Memory Core
//!
//! The demand-paged VM subsystem of the Tern teaching kernel, targeting a
//! 32-bit MIPS-like machine whose TLB is refilled by software.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//! - `machine`: Machine interface (TLB, interrupt priority, page allocator)
//! - `memory`: Frame wrapper, address types, kernel heap
//! - `vm`: Address spaces, regions, the two-level page table, fault handling
//! - `proc`: The current-address-space hook used by activation and faults
//! - `debug`: Debug output and logging
//!
//! # Dual-mode machine backend
//!
//! On target builds the `machine` module binds to the real collaborators
//! (assembly TLB routines, the interrupt layer, the kernel-page allocator).
//! Under `cargo test`, or with the `mock` feature, it binds to an in-process
//! mock machine with a counting frame pool and a recorded TLB, so the whole
//! VM core runs and is tested on a development host.

#![cfg_attr(not(test), no_std)]

// Enable the alloc crate for heap allocation
extern crate alloc;

// Module declarations
pub mod config;
pub mod debug;
pub mod machine;
pub mod memory;
pub mod proc;
pub mod vm;

#[cfg(test)]
pub(crate) mod test_support;

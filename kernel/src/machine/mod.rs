//! Machine interface
//!
//! The VM core consumes four machine services: the TLB write primitives, the
//! interrupt-priority bracket, the kernel-page allocator, and a debug console
//! byte sink. This module is the single seam through which all of them pass.
//!
//! # Backends
//!
//! - `mips`: the real machine. Binds to the assembly TLB routines and the
//!   interrupt/allocator layers the kernel image links against.
//! - `mock`: an in-process machine for host builds (`mock` feature, and
//!   always under `cargo test`): a counting frame pool, a recorded TLB, and
//!   a tracked interrupt level.
//!
//! Both backends expose the same function surface; everything above this
//! module is backend-agnostic.

pub mod interrupt;
pub mod tlb;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(not(any(test, feature = "mock")))]
pub(crate) mod mips;

#[cfg(any(test, feature = "mock"))]
pub(crate) use mock as backend;

#[cfg(not(any(test, feature = "mock")))]
pub(crate) use mips as backend;

pub(crate) use backend::{alloc_kpages, console_put, frame_base, free_kpages};

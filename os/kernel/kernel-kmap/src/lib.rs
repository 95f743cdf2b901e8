//! # Ephemeral Highmem Mappings
//!
//! A 32-bit kernel cannot keep all of physical memory mapped. Pages above the
//! linear map ("highmem") have to be mapped on demand before the kernel can
//! touch them. This crate provides the short-lived, non-sleeping kind of
//! mapping (`kmap_atomic`) and the thin front end to the sleeping kind
//! (`kmap`).
//!
//! ## Overview
//!
//! ```text
//!   caller ──► AtomicMapper ──► NestingScope ──► SlotTable ──► PageTable
//!                  │                 │
//!                  │                 └─ PerCpuNesting   (non-preemptible)
//!                  │                 └─ PerTaskNesting  (preemptible, + switch_kmaps)
//!                  └──► PersistentMap (blocking kmap, reuse of existing mappings)
//! ```
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Slot table | [`slot`] | `cpus × N` fixmap pages; the single slot → address function |
//! | Nesting index | [`nesting`] | Lock-free LIFO depth counter per CPU |
//! | Atomic mapper | [`mapper`] | `map_atomic`, `unmap_atomic`, `map`, `unmap`, reverse lookup |
//! | RAII guard | [`AtomicKmap`] | Unmaps on drop, in reverse declaration order |
//! | Preserver | [`preempt`] | Per-task slot state and `switch_kmaps` |
//! | Collaborators | [`platform`] | Traits the architecture and the persistent pool implement |
//!
//! ## Contract Violations
//!
//! Exhausting the slots, unmapping out of order, or unmapping something that
//! was never mapped are kernel bugs. They are reported as a
//! [`KmapViolation`], logged at `error` level and then halt via `panic!`.
//! Nothing in this crate returns a runtime error from the mapping path.
//!
//! ## Configuration
//!
//! - Layout: [`kernel_info::memory`] (`FIXADDR_START`, `KM_TYPE_NR`, `NR_CPUS`, ...).
//! - Behavior: [`KmapPolicy`] flags. The `debug-highmem` feature turns on
//!   [`KmapPolicy::DEBUG_CHECKS`] in [`KmapPolicy::default`] for release builds.
//! - Preemption model: the nesting scope type.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kernel_kmap::{AtomicMapper, KernelNesting, KmapPolicy, SlotTable};
//!
//! let mapper = AtomicMapper::new(arch, pkmap, KernelNesting::new(), SlotTable::KERNEL, KmapPolicy::default());
//! mapper.with_atomic(page, |va| zero_page(va));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
mod guard;
pub mod mapper;
pub mod nesting;
pub mod platform;
mod policy;
pub mod preempt;
mod pte;
pub mod slot;

pub use error::{KmapViolation, LayoutError};
pub use guard::AtomicKmap;
pub use mapper::AtomicMapper;
pub use nesting::{NestingIndex, NestingScope, PerCpuNesting};
pub use platform::{DataCache, ExecutionContext, PageDirectory, PageTable, PersistentMap, Platform};
pub use policy::KmapPolicy;
pub use preempt::{CurrentTask, PerTaskNesting, TaskKmaps};
pub use pte::{KMAP_PROT, KmapPte};
pub use slot::{CpuId, SlotIndex, SlotTable};

use kernel_info::memory::{KM_TYPE_NR, NR_CPUS};

/// Slot table with the kernel's fixmap layout.
pub type KernelSlotTable = SlotTable<KM_TYPE_NR>;

/// Per-CPU nesting state for every CPU of the kernel layout.
pub type KernelNesting = PerCpuNesting<KM_TYPE_NR, NR_CPUS>;

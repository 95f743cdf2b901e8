//! # Kernel Configuration for 32-bit Highmem Platforms
//!
//! This crate is the single source of truth for the virtual address layout the
//! highmem mapping code relies on. Every window that ephemeral or persistent
//! mappings live in is defined here as a compile-time constant, together with
//! `const` assertions that keep the windows from overlapping.
//!
//! ## Virtual Memory Architecture
//!
//! A 32-bit kernel has far less virtual space than it may have physical
//! memory. Only the first part of physical memory ("lowmem") is permanently
//! mapped; the rest ("highmem") is reached through two small windows:
//!
//! ```text
//! Virtual Address Space Layout (32-bit):
//!
//! 0x0000_0000   ┌─────────────────────────────────┐
//!               │          User Space             │
//! PKMAP_BASE    ├─────────────────────────────────┤ 0xBFE0_0000
//!               │   Persistent kmap window        │
//!               │   (LAST_PKMAP pages, sleeping)  │
//! PAGE_OFFSET   ├─────────────────────────────────┤ 0xC000_0000
//!               │   Lowmem linear map             │
//!               │   (PHYS_OFFSET + LOWMEM_SIZE)   │
//! LOWMEM_END    ├─────────────────────────────────┤ 0xEF80_0000
//!               │   vmalloc / I/O                 │
//! FIXADDR_START ├─────────────────────────────────┤ 0xFFF0_0000
//!               │   Fixmap: KM_TYPE_NR slots      │
//!               │   per CPU (atomic kmaps)        │
//! FIXADDR_TOP   ├─────────────────────────────────┤ 0xFFFE_0000
//!               │   Vectors                       │
//! 0xFFFF_FFFF   └─────────────────────────────────┘
//! ```
//!
//! ### Design Principles
//! * **Fixed Layout**: every window is a compile-time constant.
//! * **Per-CPU Slots**: the fixmap window is carved into `NR_CPUS` groups of
//!   `KM_TYPE_NR` pages, one group per CPU.
//! * **Validated**: `const` assertions reject layouts where the windows
//!   overlap or the fixmap cannot hold every CPU's slots.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;

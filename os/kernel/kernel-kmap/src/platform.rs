//! # Collaborator Interfaces
//!
//! The atomic mapper owns no hardware. Everything it needs from the rest of
//! the kernel comes through the traits in this module:
//!
//! | Trait | Provides |
//! |-------|----------|
//! | [`ExecutionContext`] | current CPU, interrupt/atomic state, pagefault disabling |
//! | [`PageTable`] | reading and writing the PTE behind a slot address |
//! | [`DataCache`] | whether unmapping needs a flush, and the flush itself |
//! | [`PageDirectory`] | page descriptors: lowmem/highmem class, frame, linear address |
//! | [`PersistentMap`] | the sleeping kmap pool |
//!
//! [`Platform`] bundles the first four; it is implemented automatically.
//!
//! All methods take `&self`. Implementations are expected to be thin wrappers
//! around per-CPU registers and page tables, not owners of mutable state.

use crate::pte::KmapPte;
use crate::slot::CpuId;
use core::fmt;
use kernel_info::memory::{LAST_PKMAP, LOWMEM_END, PAGE_OFFSET, PKMAP_BASE, pkmap_addr};
use kernel_memory_addresses::{PageFrameNumber, VirtualAddress};

/// Facts about, and control over, the code that is currently running.
pub trait ExecutionContext {
    /// The CPU executing the caller.
    fn current_cpu(&self) -> CpuId;

    /// Running in hard or soft interrupt context.
    fn in_interrupt(&self) -> bool;

    /// Running in any context that must not sleep.
    fn in_atomic(&self) -> bool;

    /// Make page faults fail fast instead of being handled. Nests.
    fn pagefault_disable(&self);

    /// Undo one [`pagefault_disable`](Self::pagefault_disable).
    fn pagefault_enable(&self);
}

/// Access to the kernel page-table entries that back kmap slots.
pub trait PageTable {
    /// Entry currently installed for the page at `va`.
    fn read_pte(&self, va: VirtualAddress) -> KmapPte;

    /// Install `pte` for the page at `va`.
    ///
    /// Implementations must also invalidate the local TLB entry for `va`, so
    /// the next access sees the new translation.
    fn write_pte(&self, va: VirtualAddress, pte: KmapPte);

    /// Bind `va` to the frame and protection in `pte`.
    #[inline]
    fn bind(&self, va: VirtualAddress, pte: KmapPte) {
        debug_assert!(!pte.is_none(), "binding {va} to the none entry");
        self.write_pte(va, pte);
    }

    /// Return `va` to the free state.
    #[inline]
    fn unbind(&self, va: VirtualAddress) {
        self.write_pte(va, KmapPte::NONE);
    }
}

/// Data cache maintenance.
pub trait DataCache {
    /// The cache is tagged by virtual address (VIVT), so lines written through
    /// a slot must be flushed before the slot maps another page.
    fn requires_flush_on_unmap(&self) -> bool;

    /// Clean and invalidate `len` bytes starting at `start`.
    fn flush_range(&self, start: VirtualAddress, len: u32);
}

/// Page descriptors and their classification.
///
/// A page's class is fixed when it is allocated and never changes. The mapper
/// relies on this: a page that was high at `map_atomic` is still high at
/// `unmap_atomic`.
pub trait PageDirectory {
    /// Page descriptor handle.
    type Page: Copy + Eq + fmt::Debug;

    /// The page lies outside the permanent linear map.
    fn is_high(&self, page: Self::Page) -> bool;

    fn frame_of(&self, page: Self::Page) -> PageFrameNumber;

    /// Permanent address of a lowmem page.
    fn lowmem_address(&self, page: Self::Page) -> VirtualAddress;

    /// Descriptor for a frame.
    fn page_of_frame(&self, pfn: PageFrameNumber) -> Self::Page;

    /// Descriptor for an address inside the linear map.
    fn lowmem_page(&self, va: VirtualAddress) -> Self::Page;

    /// `va` lies inside the permanent linear map.
    #[inline]
    fn is_lowmem_address(&self, va: VirtualAddress) -> bool {
        VirtualAddress::new(PAGE_OFFSET) <= va && va < VirtualAddress::new(LOWMEM_END)
    }
}

/// The persistent kmap pool.
///
/// Page selection, reference counting and waiting for a free entry all
/// happen behind this trait.
pub trait PersistentMap {
    type Page: Copy + Eq + fmt::Debug;

    /// Map `page` at a stable address, sleeping until an entry is free.
    fn map(&self, page: Self::Page) -> VirtualAddress;

    /// Drop one reference to `page`'s mapping. Never sleeps.
    fn unmap(&self, page: Self::Page);

    /// If `page` already has a persistent mapping, take a reference and
    /// return its address. Never sleeps.
    fn get(&self, page: Self::Page) -> Option<VirtualAddress>;

    /// Page mapped at `va`, if any.
    fn page_at(&self, va: VirtualAddress) -> Option<Self::Page>;

    /// `va` lies inside the persistent window.
    #[inline]
    fn contains(&self, va: VirtualAddress) -> bool {
        VirtualAddress::new(PKMAP_BASE) <= va && va < VirtualAddress::new(pkmap_addr(LAST_PKMAP))
    }
}

/// Everything the atomic mapper needs from the architecture.
pub trait Platform: ExecutionContext + PageTable + DataCache + PageDirectory {}

impl<T> Platform for T where T: ExecutionContext + PageTable + DataCache + PageDirectory {}

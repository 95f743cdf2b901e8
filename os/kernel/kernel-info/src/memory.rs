//! # Memory Layout

pub use kernel_memory_addresses::{PAGE_SHIFT, PAGE_SIZE};

/// Size covered by one second-level page table (one PMD entry).
pub const PMD_SIZE: u32 = 2 * 1024 * 1024;

/// Start of the kernel's lowmem linear map.
pub const PAGE_OFFSET: u32 = 0xC000_0000;

/// Physical address that [`PAGE_OFFSET`] maps to.
pub const PHYS_OFFSET: u64 = 0x8000_0000;

/// Amount of physical memory covered by the permanent linear map.
pub const LOWMEM_SIZE: u32 = 760 * 1024 * 1024;

/// First virtual address past the lowmem linear map.
pub const LOWMEM_END: u32 = PAGE_OFFSET + LOWMEM_SIZE;

/// Base of the persistent (sleeping) kmap window, one PMD below the linear map.
pub const PKMAP_BASE: u32 = PAGE_OFFSET - PMD_SIZE;

/// Number of pages in the persistent kmap window.
pub const LAST_PKMAP: usize = 512;

/// Start of the fixmap window that holds the atomic kmap slots.
pub const FIXADDR_START: u32 = 0xFFF0_0000;

/// End (exclusive) of the fixmap window.
pub const FIXADDR_TOP: u32 = 0xFFFE_0000;

/// Number of fixmap pages.
pub const FIX_KMAP_PAGES: usize = ((FIXADDR_TOP - FIXADDR_START) >> PAGE_SHIFT) as usize;

/// Atomic kmap slots per CPU, i.e. the maximum nesting depth.
pub const KM_TYPE_NR: usize = 16;

/// Number of CPUs the fixmap window is laid out for.
pub const NR_CPUS: usize = 4;

/// Virtual address of persistent kmap entry `nr`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn pkmap_addr(nr: usize) -> u32 {
    PKMAP_BASE + ((nr as u32) << PAGE_SHIFT)
}

/// Persistent kmap entry number of `vaddr`.
#[must_use]
pub const fn pkmap_nr(vaddr: u32) -> usize {
    ((vaddr - PKMAP_BASE) >> PAGE_SHIFT) as usize
}

const _: () = {
    assert!(PKMAP_BASE.is_multiple_of(PMD_SIZE));
    assert!(pkmap_addr(LAST_PKMAP) <= PAGE_OFFSET);
    assert!(LOWMEM_END <= FIXADDR_START);
    assert!(FIXADDR_START.is_multiple_of(PAGE_SIZE));
    assert!(KM_TYPE_NR * NR_CPUS <= FIX_KMAP_PAGES);
};

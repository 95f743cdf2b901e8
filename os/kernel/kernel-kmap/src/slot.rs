//! # Slot Table
//!
//! The fixmap window is an arena of `cpus × N` page-sized slots. Slot
//! `(cpu, slot)` lives at
//!
//! ```text
//! base + ((slot + N * cpu) << PAGE_SHIFT)
//! ```
//!
//! [`SlotTable::address_of`] is the only place this arithmetic happens; the
//! rest of the crate deals in [`CpuId`] and [`SlotIndex`].

use crate::error::LayoutError;
use crate::platform::PageTable;
use core::fmt;
use kernel_info::memory::{
    FIXADDR_START, KM_TYPE_NR, LAST_PKMAP, NR_CPUS, PAGE_SHIFT, PAGE_SIZE, PKMAP_BASE, pkmap_addr,
};
use kernel_memory_addresses::{PageFrameNumber, VirtualAddress};

/// Logical CPU index (`0..n-1`).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct CpuId(u32);

impl CpuId {
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a slot within one CPU's group, i.e. the nesting depth at which
/// it was handed out.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SlotIndex(usize);

impl SlotIndex {
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-CPU table of `N` atomic kmap slots inside the fixmap window.
///
/// # Invariants
/// - The window is page aligned and fits below 4 GiB.
/// - The window does not overlap the persistent kmap window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlotTable<const N: usize> {
    base: VirtualAddress,
    cpus: usize,
}

impl SlotTable<KM_TYPE_NR> {
    /// The kernel's fixmap layout from [`kernel_info::memory`].
    pub const KERNEL: Self = Self {
        base: VirtualAddress::new(FIXADDR_START),
        cpus: NR_CPUS,
    };
}

impl<const N: usize> SlotTable<N> {
    /// Lay out `cpus` groups of `N` slots starting at `base`.
    ///
    /// # Errors
    /// Returns a [`LayoutError`] if `base` is unaligned, `cpus` is zero, the
    /// window wraps past the end of the address space, or it overlaps the
    /// persistent kmap window.
    pub fn new(base: VirtualAddress, cpus: usize) -> Result<Self, LayoutError> {
        const { assert!(N > 0, "a slot table needs at least one slot per CPU") };

        if !base.is_page_aligned() {
            return Err(LayoutError::Unaligned(base));
        }
        if cpus == 0 {
            return Err(LayoutError::NoCpus);
        }

        let slots = N * cpus;
        let end = u32::try_from(slots)
            .ok()
            .and_then(|s| s.checked_mul(PAGE_SIZE))
            .and_then(|len| base.checked_add(len))
            .ok_or(LayoutError::Overflow { base, slots })?;

        let pkmap_start = VirtualAddress::new(PKMAP_BASE);
        let pkmap_end = VirtualAddress::new(pkmap_addr(LAST_PKMAP));
        if base < pkmap_end && pkmap_start < end {
            return Err(LayoutError::OverlapsPersistent);
        }

        Ok(Self { base, cpus })
    }

    /// Slots per CPU.
    #[inline]
    #[must_use]
    pub const fn slots_per_cpu(&self) -> usize {
        N
    }

    #[inline]
    #[must_use]
    pub const fn cpus(&self) -> usize {
        self.cpus
    }

    /// First address of the window.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.base
    }

    /// First address past the window.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn end(&self) -> VirtualAddress {
        // `new` checked that this fits.
        VirtualAddress::new(self.base.as_u32() + ((N * self.cpus) as u32) * PAGE_SIZE)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, address: VirtualAddress) -> bool {
        self.start() <= address && address < self.end()
    }

    /// Virtual address of slot `slot` on `cpu`.
    ///
    /// `slot` must be below `N` and `cpu` below [`cpus`](Self::cpus); both are
    /// asserted in debug builds.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn address_of(&self, cpu: CpuId, slot: SlotIndex) -> VirtualAddress {
        debug_assert!(slot.as_usize() < N, "slot {slot} out of range (N = {N})");
        debug_assert!(cpu.as_usize() < self.cpus, "CPU {cpu} outside the fixmap layout");
        let idx = slot.as_usize() + N * cpu.as_usize();
        self.base + ((idx as u32) << PAGE_SHIFT)
    }

    /// Inverse of [`address_of`](Self::address_of) for any address inside a slot.
    #[must_use]
    pub fn slot_of(&self, address: VirtualAddress) -> Option<(CpuId, SlotIndex)> {
        if !self.contains(address) {
            return None;
        }
        let idx = (address.checked_offset_from(self.base)? >> PAGE_SHIFT) as usize;
        let cpu = u32::try_from(idx / N).ok()?;
        Some((CpuId::new(cpu), SlotIndex::new(idx % N)))
    }

    /// Frame currently bound at the slot containing `address`, if any.
    ///
    /// Reads the page table only; never changes a binding.
    #[must_use]
    pub fn current_binding<T: PageTable + ?Sized>(
        &self,
        table: &T,
        address: VirtualAddress,
    ) -> Option<PageFrameNumber> {
        debug_assert!(self.contains(address), "{address} is not a kmap slot");
        let pte = table.read_pte(address.page_base());
        (!pte.is_none()).then(|| pte.frame())
    }
}

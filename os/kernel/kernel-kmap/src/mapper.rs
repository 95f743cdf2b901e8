//! # Atomic Mapper
//!
//! Gives kernel code a temporary virtual address for any physical page,
//! including pages outside the permanent linear map, without sleeping.
//!
//! ## Address classes
//!
//! ```text
//!   PKMAP_BASE          PAGE_OFFSET        LOWMEM_END   FIXADDR_START
//!       │  persistent window  │   linear map    │  ...  │  atomic slots  │
//!       ▼                     ▼                 ▼       ▼                ▼
//!  ─────┬─────────────────────┬─────────────────┬───────┬────────────────┬───
//!       │ PersistentMap       │ lowmem (stable) │       │ SlotTable<N>   │
//!  ─────┴─────────────────────┴─────────────────┴───────┴────────────────┴───
//! ```
//!
//! [`AtomicMapper::map_atomic`] hands out one of three kinds of address:
//!
//! | Page | Address | Released by `unmap_atomic` through |
//! |------|---------|------------------------------------|
//! | lowmem | its linear-map address | nothing (page faults only) |
//! | highmem, already persistently mapped (reuse on) | the persistent address | [`PersistentMap::unmap`] |
//! | highmem | the next free slot of the current CPU | slot pop |
//!
//! [`AtomicMapper::unmap_atomic`] tells them apart by address alone.
//!
//! ## Nesting
//! Slots form a stack per nesting scope. Unmaps must come in the reverse
//! order of maps; with [`KmapPolicy::DEBUG_CHECKS`] an out-of-order unmap is
//! caught and halts. The [`AtomicKmap`] guard gets the order right for free.
//!
//! ## Page classes
//! Whether a page is high never changes after it is allocated. The mapper
//! checks the class at map time only and trusts the address at unmap time.

use crate::error::{KmapViolation, violation};
use crate::guard::AtomicKmap;
use crate::nesting::NestingScope;
use crate::platform::{ExecutionContext, PersistentMap, Platform};
use crate::policy::KmapPolicy;
use crate::pte::{KMAP_PROT, KmapPte};
use crate::slot::{CpuId, SlotIndex, SlotTable};
use kernel_info::memory::{KM_TYPE_NR, PAGE_SIZE};
use kernel_memory_addresses::{PageFrameNumber, VirtualAddress};
use log::{debug, trace};

/// Maps pages into per-CPU fixmap slots.
///
/// - `P` is the architecture ([`Platform`]).
/// - `K` is the persistent kmap pool, sharing `P`'s page type.
/// - `S` decides where nesting state lives: per CPU
///   ([`PerCpuNesting`](crate::PerCpuNesting)) or per task
///   ([`PerTaskNesting`](crate::PerTaskNesting)).
/// - `N` is the number of slots per CPU.
pub struct AtomicMapper<P, K, S, const N: usize = KM_TYPE_NR> {
    pub(crate) platform: P,
    pub(crate) persistent: K,
    pub(crate) nesting: S,
    pub(crate) slots: SlotTable<N>,
    policy: KmapPolicy,
}

/// Re-enables page faults when dropped, so every exit from
/// [`AtomicMapper::unmap_atomic`] balances the disable done at map time.
struct EnablePagefaultsOnDrop<'a, E: ExecutionContext>(&'a E);

impl<E: ExecutionContext> Drop for EnablePagefaultsOnDrop<'_, E> {
    fn drop(&mut self) {
        self.0.pagefault_enable();
    }
}

impl<P, K, S, const N: usize> AtomicMapper<P, K, S, N>
where
    P: Platform,
    K: PersistentMap<Page = P::Page>,
    S: NestingScope<N>,
{
    #[must_use]
    pub fn new(platform: P, persistent: K, nesting: S, slots: SlotTable<N>, policy: KmapPolicy) -> Self {
        debug!(
            "kmap: {N} slots/CPU x {} CPUs at {}..{}, policy {policy:?}",
            slots.cpus(),
            slots.start(),
            slots.end()
        );
        Self {
            platform,
            persistent,
            nesting,
            slots,
            policy,
        }
    }

    #[inline]
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    #[must_use]
    pub const fn persistent(&self) -> &K {
        &self.persistent
    }

    #[inline]
    #[must_use]
    pub const fn nesting(&self) -> &S {
        &self.nesting
    }

    #[inline]
    #[must_use]
    pub const fn slots(&self) -> &SlotTable<N> {
        &self.slots
    }

    #[inline]
    #[must_use]
    pub const fn policy(&self) -> KmapPolicy {
        self.policy
    }

    /// Map `page` at an address that stays valid until [`unmap`](Self::unmap).
    ///
    /// May sleep waiting for a persistent entry.
    ///
    /// # Panics
    /// With debug checks on, when called from atomic context.
    #[must_use]
    pub fn map(&self, page: P::Page) -> VirtualAddress {
        if self.policy.debug_checks() && self.platform.in_atomic() {
            violation(KmapViolation::SleepInAtomic);
        }
        if !self.platform.is_high(page) {
            return self.platform.lowmem_address(page);
        }
        self.persistent.map(page)
    }

    /// Release a mapping obtained from [`map`](Self::map).
    ///
    /// # Panics
    /// When called from interrupt context.
    pub fn unmap(&self, page: P::Page) {
        if self.platform.in_interrupt() {
            violation(KmapViolation::UnmapInInterrupt);
        }
        if !self.platform.is_high(page) {
            return;
        }
        self.persistent.unmap(page);
    }

    /// Map `page` without sleeping.
    ///
    /// Page faults stay disabled until the matching
    /// [`unmap_atomic`](Self::unmap_atomic). Safe to call from interrupt
    /// context, including while the interrupted code holds atomic kmaps.
    ///
    /// # Panics
    /// When the current nesting has used all `N` slots, or (with debug
    /// checks) when the claimed slot is still bound.
    #[must_use]
    pub fn map_atomic(&self, page: P::Page) -> VirtualAddress {
        self.platform.pagefault_disable();

        if !self.platform.is_high(page) {
            return self.platform.lowmem_address(page);
        }

        if self
            .policy
            .reuses_persistent(self.platform.requires_flush_on_unmap())
            && let Some(va) = self.persistent.get(page)
        {
            trace!("kmap_atomic: reusing persistent mapping {va} for {page:?}");
            return va;
        }

        let frame = self.platform.frame_of(page);
        self.push_slot(KmapPte::mk(frame, KMAP_PROT))
    }

    /// Map a raw frame into a slot, whatever its class.
    ///
    /// # Panics
    /// As [`map_atomic`](Self::map_atomic).
    #[must_use]
    pub fn map_atomic_frame(&self, pfn: PageFrameNumber) -> VirtualAddress {
        self.platform.pagefault_disable();
        self.push_slot(KmapPte::mk(pfn, KMAP_PROT))
    }

    /// Release an address returned by [`map_atomic`](Self::map_atomic) or
    /// [`map_atomic_frame`](Self::map_atomic_frame).
    ///
    /// `address` may point anywhere inside the mapped page.
    ///
    /// # Panics
    /// When `address` is outside the slot, persistent and linear-map windows,
    /// when it is a slot but nothing is mapped in this nesting, when it is a
    /// persistent address with no page behind it, or (with debug checks) when
    /// it is not the most recent slot.
    pub fn unmap_atomic(&self, address: VirtualAddress) {
        let va = address.page_base();

        // Reject bad addresses before page faults come back on.
        if self.slots.contains(va) {
            let (cpu, slot) = self.top_slot(va);
            let _faults = EnablePagefaultsOnDrop(&self.platform);
            self.pop_slot(cpu, slot, va);
        } else if self.persistent.contains(va) {
            let Some(page) = self.persistent.page_at(va) else {
                violation(KmapViolation::UnknownPersistent { address: va });
            };
            let _faults = EnablePagefaultsOnDrop(&self.platform);
            self.persistent.unmap(page);
        } else if self.platform.is_lowmem_address(va) {
            self.platform.pagefault_enable();
        } else {
            violation(KmapViolation::UnknownAddress { address });
        }
    }

    /// Map `page` and return a guard that unmaps it when dropped.
    #[must_use = "dropping the guard unmaps the page immediately"]
    pub fn kmap_atomic(&self, page: P::Page) -> AtomicKmap<'_, P, K, S, N> {
        AtomicKmap::new(self, self.map_atomic(page))
    }

    /// Run `f` with `page` mapped.
    pub fn with_atomic<R>(&self, page: P::Page, f: impl FnOnce(VirtualAddress) -> R) -> R {
        let kmap = self.kmap_atomic(page);
        f(kmap.address())
    }

    /// Page behind an address handed out by this mapper, or any lowmem
    /// address.
    ///
    /// # Panics
    /// When `address` is a free slot, an unused persistent entry, or outside
    /// every kmap window and the linear map.
    #[must_use]
    pub fn owning_page_of(&self, address: VirtualAddress) -> P::Page {
        let va = address.page_base();
        if self.slots.contains(va) {
            let Some(pfn) = self.slots.current_binding(&self.platform, va) else {
                violation(KmapViolation::UnboundSlot { address: va });
            };
            return self.platform.page_of_frame(pfn);
        }
        if self.persistent.contains(va) {
            let Some(page) = self.persistent.page_at(va) else {
                violation(KmapViolation::UnknownPersistent { address: va });
            };
            return page;
        }
        if !self.platform.is_lowmem_address(va) {
            violation(KmapViolation::UnknownAddress { address });
        }
        self.platform.lowmem_page(address)
    }

    /// Frame bound at slot address `address`, if any.
    #[must_use]
    pub fn current_binding(&self, address: VirtualAddress) -> Option<PageFrameNumber> {
        self.slots.current_binding(&self.platform, address)
    }

    fn push_slot(&self, pte: KmapPte) -> VirtualAddress {
        let cpu = self.platform.current_cpu();
        let slot = self.nesting.index(cpu).push(cpu);
        let va = self.slots.address_of(cpu, slot);

        // An unmap that never happened leaves its binding behind.
        if self.policy.debug_checks() && !self.platform.read_pte(va).is_none() {
            violation(KmapViolation::StaleSlot {
                cpu,
                slot,
                address: va,
            });
        }

        self.nesting.record(cpu, slot, pte);
        self.platform.bind(va, pte);
        trace!("kmap_atomic: CPU {cpu} slot {slot} at {va} -> {}", pte.frame().base());
        va
    }

    /// The slot `va` must be released from: the top of the current nesting.
    fn top_slot(&self, va: VirtualAddress) -> (CpuId, SlotIndex) {
        let cpu = self.platform.current_cpu();
        let Some(slot) = self.nesting.index(cpu).top() else {
            violation(KmapViolation::UnmatchedUnmap { address: va });
        };

        if self.policy.debug_checks() && self.slots.slot_of(va) != Some((cpu, slot)) {
            violation(KmapViolation::OutOfOrder {
                expected: self.slots.address_of(cpu, slot),
                found: va,
            });
        }
        (cpu, slot)
    }

    fn pop_slot(&self, cpu: CpuId, slot: SlotIndex, va: VirtualAddress) {
        if self.platform.requires_flush_on_unmap() {
            self.platform.flush_range(va, PAGE_SIZE);
        }
        self.nesting.record(cpu, slot, KmapPte::NONE);
        self.platform.unbind(va);
        let _ = self.nesting.index(cpu).pop();
        trace!("kunmap_atomic: CPU {cpu} slot {slot} at {va}");
    }
}

//! # Context-Switch Slot Preserver
//!
//! On a fully preemptible kernel a task can be switched out while it holds
//! atomic kmaps. The slots themselves are per CPU, so the nesting depth and
//! the entries behind it have to travel with the task:
//!
//! ```text
//!            CPU 0 slots                     task state
//!   T1 maps A ─► [0: A] [1: -]      T1.kmaps = { depth 1, [A, -] }
//!   switch T1 ─► T2
//!      clear   ─► [0: -] [1: -]
//!      restore ─► (T2 holds nothing)
//!   T2 maps B ─► [0: B] [1: -]      T2.kmaps = { depth 1, [B, -] }
//!   T2 unmaps ─► [0: -] [1: -]      T2.kmaps = { depth 0, [-, -] }
//!   switch T2 ─► T1
//!      restore ─► [0: A] [1: -]
//! ```
//!
//! [`PerTaskNesting`] keeps each task's depth and entries in its
//! [`TaskKmaps`]; [`AtomicMapper::switch_kmaps`] swaps the CPU's slots at the
//! switch. Mappers built with [`PerCpuNesting`](crate::PerCpuNesting) have no
//! `switch_kmaps` at all.

use crate::mapper::AtomicMapper;
use crate::nesting::{NestingIndex, NestingScope};
use crate::platform::{PersistentMap, Platform};
use crate::pte::KmapPte;
use crate::slot::{CpuId, SlotIndex};
use core::sync::atomic::{AtomicU64, Ordering};
use log::trace;

/// Atomic kmap state carried by one task.
#[derive(Debug)]
pub struct TaskKmaps<const N: usize> {
    index: NestingIndex<N>,
    ptes: [AtomicU64; N],
}

impl<const N: usize> TaskKmaps<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            index: NestingIndex::new(),
            ptes: [const { AtomicU64::new(0) }; N],
        }
    }

    /// Number of slots the task holds.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.index.depth()
    }

    /// Entry the task expects in `slot`.
    #[inline]
    #[must_use]
    pub fn pte(&self, slot: SlotIndex) -> KmapPte {
        KmapPte::from_bits(self.ptes[slot.as_usize()].load(Ordering::Relaxed))
    }

    /// The task's slots below its depth, with their entries.
    #[must_use]
    pub fn bindings(&self) -> impl Iterator<Item = (SlotIndex, KmapPte)> + '_ {
        (0..self.depth().min(N))
            .map(SlotIndex::new)
            .map(|slot| (slot, self.pte(slot)))
    }

    fn set(&self, slot: SlotIndex, pte: KmapPte) {
        self.ptes[slot.as_usize()].store(pte.into_bits(), Ordering::Relaxed);
    }
}

impl<const N: usize> Default for TaskKmaps<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The scheduler's view of which task runs where.
pub trait CurrentTask<const N: usize> {
    /// Kmap state of the task currently running on `cpu`.
    fn current_kmaps(&self, cpu: CpuId) -> &TaskKmaps<N>;
}

/// Nesting state kept per task, for kernels where kmap holders can be
/// preempted.
#[derive(Debug, Default)]
pub struct PerTaskNesting<T> {
    tasks: T,
}

impl<T> PerTaskNesting<T> {
    #[must_use]
    pub const fn new(tasks: T) -> Self {
        Self { tasks }
    }

    #[inline]
    #[must_use]
    pub const fn tasks(&self) -> &T {
        &self.tasks
    }
}

impl<T: CurrentTask<N>, const N: usize> NestingScope<N> for PerTaskNesting<T> {
    #[inline]
    fn index(&self, cpu: CpuId) -> &NestingIndex<N> {
        &self.tasks.current_kmaps(cpu).index
    }

    #[inline]
    fn record(&self, cpu: CpuId, slot: SlotIndex, pte: KmapPte) {
        self.tasks.current_kmaps(cpu).set(slot, pte);
    }
}

impl<P, K, T, const N: usize> AtomicMapper<P, K, PerTaskNesting<T>, N>
where
    P: Platform,
    K: PersistentMap<Page = P::Page>,
    T: CurrentTask<N>,
{
    /// Hand the current CPU's slots from `prev` to `next`.
    ///
    /// Called by the scheduler with preemption disabled, between saving
    /// `prev` and resuming `next`. Unbinds every slot `prev` holds, then
    /// rebinds every slot `next` had bound when it was switched out.
    pub fn switch_kmaps(&self, prev: &TaskKmaps<N>, next: &TaskKmaps<N>) {
        let cpu = self.platform.current_cpu();

        for (slot, _) in prev.bindings() {
            self.platform.unbind(self.slots.address_of(cpu, slot));
        }

        for (slot, pte) in next.bindings().filter(|(_, pte)| !pte.is_none()) {
            let va = self.slots.address_of(cpu, slot);
            self.platform.bind(va, pte);
            trace!("switch_kmaps: CPU {cpu} slot {slot} at {va} -> {}", pte.frame().base());
        }
    }
}

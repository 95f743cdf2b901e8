//! # Nesting Index Stack
//!
//! Atomic kmaps nest: an interrupt may map a page while the code it
//! interrupted holds slots of its own. Slots are therefore handed out as a
//! stack. The depth counter is the whole stack; slot `i` is in use iff
//! `i < depth`.
//!
//! Where the counter lives depends on the preemption model:
//!
//! - [`PerCpuNesting`]: one counter per CPU. Holders of a kmap never
//!   schedule, so a CPU's slots belong to whatever runs on it.
//! - [`PerTaskNesting`](crate::preempt::PerTaskNesting): one counter per task,
//!   for kernels where kmap sections may be preempted.

use crate::error::{KmapViolation, violation};
use crate::pte::KmapPte;
use crate::slot::{CpuId, SlotIndex};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Slot depth of one execution context.
///
/// The counter is atomic so an interrupt arriving between a load and a store
/// cannot lose an update; it is never contended across CPUs.
#[derive(Debug, Default)]
pub struct NestingIndex<const N: usize> {
    depth: AtomicUsize,
}

impl<const N: usize> NestingIndex<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
        }
    }

    /// Number of slots in use.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Claim the next slot.
    ///
    /// # Panics
    /// All `N` slots are in use. A correctly bounded kernel never nests this
    /// deep, so this is a contract violation rather than an error.
    #[inline]
    pub fn push(&self, cpu: CpuId) -> SlotIndex {
        let depth = self.depth.fetch_add(1, Ordering::Relaxed);
        if depth >= N {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            violation(KmapViolation::SlotsExhausted { cpu, depth });
        }
        SlotIndex::new(depth)
    }

    /// The most recently claimed slot that is still in use.
    #[inline]
    #[must_use]
    pub fn top(&self) -> Option<SlotIndex> {
        self.depth().checked_sub(1).map(SlotIndex::new)
    }

    /// Release the most recently claimed slot and return it.
    ///
    /// Returns `None`, leaving the depth at zero, when nothing is claimed.
    #[inline]
    pub fn pop(&self) -> Option<SlotIndex> {
        self.depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| d.checked_sub(1))
            .ok()
            .map(|d| SlotIndex::new(d - 1))
    }
}

/// Where the current execution context keeps its nesting state.
pub trait NestingScope<const N: usize> {
    /// Nesting index of whatever is running on `cpu`.
    fn index(&self, cpu: CpuId) -> &NestingIndex<N>;

    /// Remember that `slot` now holds `pte` (or [`KmapPte::NONE`] once it is
    /// released). Only scopes that must rebuild slots after a context switch
    /// keep this.
    #[inline]
    fn record(&self, cpu: CpuId, slot: SlotIndex, pte: KmapPte) {
        let _ = (cpu, slot, pte);
    }
}

/// Nesting state for kernels where kmap holders cannot be preempted.
#[derive(Debug)]
pub struct PerCpuNesting<const N: usize, const CPUS: usize> {
    cpus: [NestingIndex<N>; CPUS],
}

impl<const N: usize, const CPUS: usize> PerCpuNesting<N, CPUS> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cpus: [const { NestingIndex::new() }; CPUS],
        }
    }
}

impl<const N: usize, const CPUS: usize> Default for PerCpuNesting<N, CPUS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const CPUS: usize> NestingScope<N> for PerCpuNesting<N, CPUS> {
    #[inline]
    fn index(&self, cpu: CpuId) -> &NestingIndex<N> {
        &self.cpus[cpu.as_usize()]
    }
}

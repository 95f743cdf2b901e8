use crate::slot::{CpuId, SlotIndex};
use kernel_memory_addresses::VirtualAddress;

/// A broken kmap contract.
///
/// These are caller bugs, not runtime conditions: continuing after one risks
/// writing through a translation that belongs to some other page. They are
/// never returned; [`violation`] logs and halts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KmapViolation {
    #[error("atomic kmap slots exhausted on CPU {cpu} (depth {depth})")]
    SlotsExhausted { cpu: CpuId, depth: usize },
    #[error("atomic kmap slot {slot} on CPU {cpu} at {address} is still bound")]
    StaleSlot {
        cpu: CpuId,
        slot: SlotIndex,
        address: VirtualAddress,
    },
    #[error("atomic kunmap out of order: expected {expected}, got {found}")]
    OutOfOrder {
        expected: VirtualAddress,
        found: VirtualAddress,
    },
    #[error("atomic kunmap of {address} without a matching kmap")]
    UnmatchedUnmap { address: VirtualAddress },
    #[error("no page is bound at atomic kmap address {address}")]
    UnboundSlot { address: VirtualAddress },
    #[error("persistent kmap address {address} has no page")]
    UnknownPersistent { address: VirtualAddress },
    #[error("{address} was not handed out by kmap")]
    UnknownAddress { address: VirtualAddress },
    #[error("sleeping kmap called from atomic context")]
    SleepInAtomic,
    #[error("kunmap called from interrupt context")]
    UnmapInInterrupt,
}

/// Rejected slot table layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("fixmap base {0} is not page aligned")]
    Unaligned(VirtualAddress),
    #[error("fixmap window needs at least one CPU")]
    NoCpus,
    #[error("{slots} fixmap slots starting at {base} run past the end of the address space")]
    Overflow { base: VirtualAddress, slots: usize },
    #[error("fixmap window overlaps the persistent kmap window")]
    OverlapsPersistent,
}

/// Halt on a broken kmap contract.
#[cold]
#[track_caller]
pub(crate) fn violation(v: KmapViolation) -> ! {
    log::error!("{v}");
    panic!("kmap contract violation: {v}");
}

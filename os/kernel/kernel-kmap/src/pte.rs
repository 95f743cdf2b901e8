//! # Atomic kmap page-table entries

use bitfield_struct::bitfield;
use kernel_memory_addresses::PageFrameNumber;

/// A second-level page-table entry as written into a kmap slot.
///
/// Models the software view of an ARM small-page PTE: the permission and
/// memory-type bits the kernel sets, plus the physical frame number. The
/// all-zero value is the *none* entry that marks a free slot.
///
/// ### Bit layout
///
/// | Bits  | Field           | Meaning |
/// |-------|-----------------|---------|
/// | 0     | `present`       | Translation is valid |
/// | 1     | `young`         | Accessed |
/// | 2     | `dirty`         | Written |
/// | 3     | `writable`      | Kernel may write |
/// | 4     | `user`          | User mode may access |
/// | 5     | `bufferable`    | Write buffer allowed (B) |
/// | 6     | `cacheable`     | Cacheable memory (C) |
/// | 7     | `execute_never` | Instruction fetches fault (XN) |
/// | 8–11  | reserved        | |
/// | 12–43 | `pfn`           | Physical frame number |
/// | 44–63 | reserved        | |
///
/// ### Example
/// ```rust
/// # use kernel_kmap::{KmapPte, KMAP_PROT};
/// # use kernel_memory_addresses::PageFrameNumber;
/// let pte = KmapPte::mk(PageFrameNumber::new(0xA_1234), KMAP_PROT);
/// assert!(pte.present());
/// assert_eq!(pte.frame(), PageFrameNumber::new(0xA_1234));
/// assert!(KmapPte::NONE.is_none());
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq, Hash)]
pub struct KmapPte {
    pub present: bool,
    pub young: bool,
    pub dirty: bool,
    pub writable: bool,
    pub user: bool,
    pub bufferable: bool,
    pub cacheable: bool,
    pub execute_never: bool,

    #[bits(4)]
    __: u8,

    #[bits(32)]
    pfn: u32,

    #[bits(20)]
    __: u32,
}

/// Protection used for ephemeral kernel mappings: present, kernel read/write,
/// write-back cacheable, never executable.
pub const KMAP_PROT: KmapPte = KmapPte::new()
    .with_present(true)
    .with_young(true)
    .with_dirty(true)
    .with_writable(true)
    .with_bufferable(true)
    .with_cacheable(true)
    .with_execute_never(true);

impl KmapPte {
    /// The entry of a free slot.
    pub const NONE: Self = Self::new();

    /// Build an entry for `frame` with the protection bits of `prot`.
    #[inline]
    #[must_use]
    pub const fn mk(frame: PageFrameNumber, prot: Self) -> Self {
        prot.with_pfn(frame.as_u32())
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.into_bits() == 0
    }

    #[inline]
    #[must_use]
    pub const fn frame(self) -> PageFrameNumber {
        PageFrameNumber::new(self.pfn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_entry_is_zero() {
        assert_eq!(KmapPte::NONE.into_bits(), 0);
        assert!(KmapPte::default().is_none());
        assert!(!KMAP_PROT.is_none());
    }

    #[test]
    fn frame_lands_in_bits_12_and_up() {
        let pte = KmapPte::mk(PageFrameNumber::new(0x000F_FFFF), KmapPte::NONE);
        assert_eq!(pte.into_bits(), 0x000F_FFFF << 12);
        assert_eq!(pte.frame().as_u32(), 0x000F_FFFF);
        assert!(!pte.present());
    }

    #[test]
    fn kmap_prot_is_kernel_only_and_not_executable() {
        let pte = KmapPte::mk(PageFrameNumber::new(1), KMAP_PROT);
        assert!(pte.present() && pte.writable() && pte.cacheable());
        assert!(pte.execute_never());
        assert!(!pte.user());
    }
}

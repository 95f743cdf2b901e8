use crate::{PAGE_SHIFT, PhysicalAddress};
use core::fmt;

/// Page frame number: a physical address divided by the page size.
///
/// Frame numbers are what page-table entries carry and what raw-frame mapping
/// paths (bulk I/O setup, early boot) pass around when no page descriptor
/// exists for the memory.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pfn = PageFrameNumber::new(0x10_0000);
/// assert_eq!(pfn.base(), PhysicalAddress::new(0x1_0000_0000));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageFrameNumber(u32);

impl PageFrameNumber {
    #[inline]
    #[must_use]
    pub const fn new(pfn: u32) -> Self {
        Self(pfn)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The physical address of the first byte of this frame.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new((self.0 as u64) << PAGE_SHIFT)
    }
}

impl fmt::Debug for PageFrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PFN({:#X})", self.0)
    }
}

impl fmt::Display for PageFrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

impl From<u32> for PageFrameNumber {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

use crate::{PAGE_SHIFT, PageFrameNumber};
use core::fmt;
use core::ops::Add;

/// Physical memory address.
///
/// Denotes a **physical** (bus) address. It is 64 bits wide because large
/// physical address extensions let a 32-bit kernel reach memory above 4 GiB,
/// which is exactly the memory that needs on-demand mapping.
///
/// ### Notes
/// - Page-table entries store the [`PageFrameNumber`] rather than the full
///   address; use [`frame`](Self::frame) to convert.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x0000_0001_0000_0042);
/// assert_eq!(pa.frame().base(), PhysicalAddress::new(0x0000_0001_0000_0000));
/// assert_eq!(pa.page_offset(), 0x42);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The frame containing this address.
    ///
    /// Addresses whose frame number would not fit 32 bits are outside any
    /// supported physical address extension; the high bits are dropped.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn frame(self) -> PageFrameNumber {
        PageFrameNumber::new((self.0 >> PAGE_SHIFT) as u32)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn page_offset(self) -> u16 {
        (self.0 & ((1 << PAGE_SHIFT) - 1)) as u16
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:010X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:010X}", self.0)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PageFrameNumber> for PhysicalAddress {
    #[inline]
    fn from(pfn: PageFrameNumber) -> Self {
        pfn.base()
    }
}

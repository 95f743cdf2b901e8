//! # Kernel Address Types for 32-bit Highmem Platforms
//!
//! Strongly typed wrappers for the three kinds of numbers the highmem mapping
//! code juggles: kernel virtual addresses, physical addresses and page frame
//! numbers.
//!
//! ## Overview
//!
//! On a 32-bit kernel the virtual address space is 4 GiB wide, while physical
//! memory (e.g. with ARM LPAE) may extend well past that. The types here keep
//! the two apart at compile time:
//!
//! | Type | Width | Description |
//! |------|-------|-------------|
//! | [`VirtualAddress`] | 32 bit | An address in the kernel's virtual address space. |
//! | [`PhysicalAddress`] | 64 bit | A bus address; may lie beyond 4 GiB. |
//! | [`PageFrameNumber`] | 32 bit | A physical address shifted right by [`PAGE_SHIFT`]. |
//!
//! All types are `#[repr(transparent)]`, `Copy`, `Ord` and `Hash`, so they can be
//! stored in page-table entries, used as map keys or compared in range checks.
//!
//! ## Page Size
//!
//! Only the base page size of 4 KiB is modeled. Ephemeral mappings are always
//! exactly one base page.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0xFFF0_1234);
//! assert_eq!(va.page_base().as_u32(), 0xFFF0_1000);
//! assert_eq!(va.page_offset(), 0x234);
//!
//! let pa = PhysicalAddress::new(0x1_2345_6000);
//! let pfn = pa.frame();
//! assert_eq!(pfn.as_u32(), 0x12_3456);
//! assert_eq!(pfn.base(), pa);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_frame;
mod physical_address;
mod virtual_address;

pub use page_frame::PageFrameNumber;
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// log2 of the base page size.
pub const PAGE_SHIFT: u32 = 12;

/// Base page size in bytes (4 KiB).
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;

/// Mask that clears the in-page offset bits of an address.
pub const PAGE_MASK: u32 = !(PAGE_SIZE - 1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_constants_agree() {
        assert_eq!(PAGE_SIZE, 4096);
        assert_eq!(PAGE_MASK, 0xFFFF_F000);
    }

    #[test]
    fn frame_round_trips_through_physical_address() {
        let pfn = PageFrameNumber::new(0x8_0001);
        assert_eq!(pfn.base().as_u64(), 0x8000_1000);
        assert_eq!(pfn.base().frame(), pfn);
    }

    #[test]
    fn physical_addresses_beyond_4g_keep_their_frame() {
        let pa = PhysicalAddress::new(0x2_0000_0042);
        assert_eq!(pa.frame().as_u32(), 0x20_0000);
        assert_eq!(pa.page_offset(), 0x42);
    }
}

//! Services the kernel provides to drivers.
#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]

use core::ops::Add;
use core::ptr::NonNull;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
/// A physical address.
pub struct PhysAddr(u64);

impl PhysAddr {
    #[must_use]
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[must_use]
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Add<u64> for PhysAddr {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Attributes of a physical mapping.
pub struct MappingFlags(u8);

impl MappingFlags {
    pub const WRITABLE: Self = Self(1 << 0);
    pub const NO_CACHE: Self = Self(1 << 1);
    pub const NO_EXECUTE: Self = Self(1 << 2);

    /// Flags suitable for device registers.
    pub const MMIO_SUITABLE: Self = Self(Self::WRITABLE.0 | Self::NO_CACHE.0 | Self::NO_EXECUTE.0);

    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Physical Mapping trait
///
/// A mapping makes a physical range visible in the kernel address space
/// for as long as the value lives; dropping it releases the virtual range.
///
/// Be careful to only use the original mapped length, as accessing outside
/// could result in undefined behavior if the memory is used by another mapping.
pub trait PhysicalMapper: Sized + Send + Sync {
    /// Maps `length` bytes starting at `paddr`.
    ///
    /// The virtual range is aligned on `alignment` bytes.
    /// Returns `None` if the kernel could not find or map a suitable range.
    fn map(paddr: PhysAddr, length: usize, alignment: usize, flags: MappingFlags) -> Option<Self>;

    /// Translates a physical address to a virtual address using the current mapping.
    fn translate(&self, paddr: PhysAddr) -> Option<NonNull<u8>>;
}

//! Enhanced Configuration Access Mechanism.
//!
//! The configuration space of every function is mapped in memory:
//! bits 27:20 of the offset select the bus, 19:15 the device, 14:12 the
//! function and 11:0 the register.
use crate::{BackendKind, BdfAddress, PciBackend, PciError, PciResult};
use core::ptr::NonNull;
use driver_api::{MappingFlags, PhysAddr, PhysicalMapper};

/// Size of the configuration space of one bus.
pub const BUS_SIZE: usize = 1 << 20;
/// Size of the configuration space of one function.
pub const FUNCTION_SIZE: u32 = 4096;

const APERTURE_ALIGNMENT: usize = 4 * 1024 * 1024;

#[must_use]
#[inline]
/// Offset of `reg` of `bdf` from the start of the aperture.
pub const fn config_offset(bdf: BdfAddress, reg: u32) -> u64 {
    ((bdf.bus() as u64) << 20)
        + ((bdf.device() as u64) << 15)
        + ((bdf.function() as u64) << 12)
        + reg as u64
}

/// ECAM backend.
///
/// Dropping the backend unmaps the aperture.
pub struct EcamBackend<M: PhysicalMapper> {
    mapping: M,
    base: PhysAddr,
    end_bus: u8,
}

impl<M: PhysicalMapper> EcamBackend<M> {
    /// Maps the aperture at `base`, covering buses `start_bus..=end_bus`.
    ///
    /// Only segment 0 starting at bus 0 is supported.
    pub fn detect(base: PhysAddr, segment: u16, start_bus: u8, end_bus: u8) -> PciResult<Self> {
        klog::debug!(
            "PCI: ecam base {:#x}, segment {}, bus [{}...{}]",
            base.as_u64(),
            segment,
            start_bus,
            end_bus
        );

        if end_bus < start_bus {
            return Err(PciError::OutOfAperture);
        }
        if segment != 0 || start_bus != 0 {
            klog::warn!("PCI: ecam segment {} starting at bus {} is not supported", segment, start_bus);
            return Err(PciError::NotSupported);
        }

        let size = (usize::from(end_bus - start_bus) + 1) * BUS_SIZE;
        let Some(mapping) = M::map(base, size, APERTURE_ALIGNMENT, MappingFlags::MMIO_SUITABLE)
        else {
            klog::warn!("PCI: failed to map ecam aperture of {} bytes", size);
            return Err(PciError::NotFound);
        };

        Ok(Self {
            mapping,
            base,
            end_bus,
        })
    }

    #[must_use]
    #[inline]
    pub const fn base(&self) -> PhysAddr {
        self.base
    }

    /// Pointer to a naturally aligned `T` at `reg` of `bdf`.
    fn config_ptr<T>(&self, bdf: BdfAddress, reg: u32) -> PciResult<NonNull<T>> {
        if reg >= FUNCTION_SIZE || reg as usize % size_of::<T>() != 0 {
            return Err(PciError::InvalidRegister(reg));
        }
        if bdf.bus() > self.end_bus {
            return Err(PciError::OutOfAperture);
        }

        self.mapping
            .translate(self.base + config_offset(bdf, reg))
            .map(NonNull::cast)
            .ok_or(PciError::OutOfAperture)
    }

    fn read<T: Copy>(&self, bdf: BdfAddress, reg: u32) -> PciResult<T> {
        let ptr = self.config_ptr::<T>(bdf, reg)?;
        // Safety:
        // The register is aligned and lies within the mapped aperture.
        Ok(unsafe { ptr.read_volatile() })
    }

    fn write<T: Copy>(&self, bdf: BdfAddress, reg: u32, value: T) -> PciResult<()> {
        let ptr = self.config_ptr::<T>(bdf, reg)?;
        // Safety:
        // The register is aligned and lies within the mapped aperture.
        unsafe { ptr.write_volatile(value) };
        Ok(())
    }
}

impl<M: PhysicalMapper> PciBackend for EcamBackend<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::Ecam
    }

    fn last_bus(&self) -> u8 {
        self.end_bus
    }

    fn read_config_byte(&self, bdf: BdfAddress, reg: u32) -> PciResult<u8> {
        self.read(bdf, reg)
    }

    fn read_config_half(&self, bdf: BdfAddress, reg: u32) -> PciResult<u16> {
        self.read(bdf, reg)
    }

    fn read_config_word(&self, bdf: BdfAddress, reg: u32) -> PciResult<u32> {
        self.read(bdf, reg)
    }

    fn write_config_byte(&self, bdf: BdfAddress, reg: u32, value: u8) -> PciResult<()> {
        self.write(bdf, reg, value)
    }

    fn write_config_half(&self, bdf: BdfAddress, reg: u32, value: u16) -> PciResult<()> {
        self.write(bdf, reg, value)
    }

    fn write_config_word(&self, bdf: BdfAddress, reg: u32, value: u32) -> PciResult<()> {
        self.write(bdf, reg, value)
    }
}

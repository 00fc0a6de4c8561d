//! Process-wide PCI access point.
//!
//! One backend is installed at boot, then every access goes through the bus
//! lock with interrupts disabled: neither the BIOS nor the Type 1 ports
//! tolerate interleaved transactions.
use crate::{
    BdfAddress, ConfigHeader, IrqRouting, IrqRoutingEntry, PciBackend, PciError, PciResult,
    bios32::{self, Bios32Environment},
    express::EcamBackend,
};
use alloc::boxed::Box;
use beskar_hal::instructions::without_interrupts;
use driver_api::{PhysAddr, PhysicalMapper};
use hyperdrive::{locks::ticket::TicketLock, once::Once};

static PCI_BUS: PciBus = PciBus::new();

/// Installed backend and its access lock.
pub struct PciBus {
    backend: Once<Box<dyn PciBackend>>,
    lock: TicketLock<()>,
}

impl Default for PciBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PciBus {
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            backend: Once::uninit(),
            lock: TicketLock::new(()),
        }
    }

    /// Installs `backend`, which is kept for the lifetime of the bus.
    ///
    /// A bus accepts a single backend: later ones are dropped.
    pub fn install(&self, backend: Box<dyn PciBackend>) -> PciResult<()> {
        let kind = backend.kind();
        let last_bus = backend.last_bus();

        if self.backend.set(backend).is_err() {
            klog::warn!("PCI: refusing to install {} functions twice", kind);
            return Err(PciError::AlreadyConfigured);
        }

        klog::info!("PCI: pci {} functions installed", kind);
        klog::info!("PCI: last pci bus is {}", last_bus);
        Ok(())
    }

    /// Installs the first legacy backend that is detected,
    /// the PCI BIOS taking precedence over Type 1.
    pub fn probe_legacy<F, G>(&self, bios32: F, type1: G) -> PciResult<()>
    where
        F: FnOnce() -> Option<Box<dyn PciBackend>>,
        G: FnOnce() -> Option<Box<dyn PciBackend>>,
    {
        if self.is_configured() {
            return Err(PciError::AlreadyConfigured);
        }

        if let Some(backend) = bios32() {
            return self.install(backend);
        }
        if let Some(backend) = type1() {
            return self.install(backend);
        }

        Err(PciError::NotFound)
    }

    #[must_use]
    #[inline]
    pub fn is_configured(&self) -> bool {
        self.backend.is_initialized()
    }

    #[must_use]
    /// Highest reachable bus, `None` before a backend is installed.
    ///
    /// The value never changes once installed, so the lock is not taken.
    pub fn last_bus(&self) -> Option<u8> {
        self.backend.get().map(|backend| backend.last_bus())
    }

    #[must_use]
    #[inline]
    /// Only segment 0 is handled.
    pub const fn last_segment(&self) -> u16 {
        0
    }

    /// Runs `f` on the backend, with the lock held and interrupts disabled.
    fn with_backend<R>(&self, f: impl FnOnce(&dyn PciBackend) -> PciResult<R>) -> PciResult<R> {
        let backend = self.backend.get().ok_or(PciError::NotConfigured)?;
        without_interrupts(|| self.lock.with_locked(|_| f(&**backend)))
    }

    pub fn read_config_byte(&self, bdf: BdfAddress, reg: u32) -> PciResult<u8> {
        self.with_backend(|backend| backend.read_config_byte(bdf, reg))
    }

    pub fn read_config_half(&self, bdf: BdfAddress, reg: u32) -> PciResult<u16> {
        self.with_backend(|backend| backend.read_config_half(bdf, reg))
    }

    pub fn read_config_word(&self, bdf: BdfAddress, reg: u32) -> PciResult<u32> {
        self.with_backend(|backend| backend.read_config_word(bdf, reg))
    }

    pub fn write_config_byte(&self, bdf: BdfAddress, reg: u32, value: u8) -> PciResult<()> {
        self.with_backend(|backend| backend.write_config_byte(bdf, reg, value))
    }

    pub fn write_config_half(&self, bdf: BdfAddress, reg: u32, value: u16) -> PciResult<()> {
        self.with_backend(|backend| backend.write_config_half(bdf, reg, value))
    }

    pub fn write_config_word(&self, bdf: BdfAddress, reg: u32, value: u32) -> PciResult<()> {
        self.with_backend(|backend| backend.write_config_word(bdf, reg, value))
    }

    pub fn find_pci_device(
        &self,
        device_id: u16,
        vendor_id: u16,
        index: u16,
    ) -> PciResult<BdfAddress> {
        self.with_backend(|backend| backend.find_pci_device(device_id, vendor_id, index))
    }

    pub fn find_pci_class_code(&self, class_code: u32, index: u16) -> PciResult<BdfAddress> {
        self.with_backend(|backend| backend.find_pci_class_code(class_code, index))
    }

    pub fn get_irq_routing_options(
        &self,
        entries: &mut [IrqRoutingEntry],
    ) -> PciResult<IrqRouting> {
        self.with_backend(|backend| backend.get_irq_routing_options(entries))
    }

    pub fn set_irq_hw_int(&self, bdf: BdfAddress, int_pin: u8, irq: u8) -> PciResult<()> {
        self.with_backend(|backend| backend.set_irq_hw_int(bdf, int_pin, irq))
    }

    /// Reads and decodes the predefined header of `bdf` in one locked section.
    pub fn read_config(&self, bdf: BdfAddress) -> PciResult<ConfigHeader> {
        self.with_backend(|backend| ConfigHeader::read(backend, bdf))
    }
}

/// Probes the legacy PC mechanisms: PCI BIOS, then Type 1.
///
/// # Safety
///
/// `env` must describe the current address space, see [`bios32::detect`].
pub unsafe fn init(env: Bios32Environment) -> PciResult<()> {
    PCI_BUS.probe_legacy(
        || {
            // Safety:
            // Guaranteed by the caller.
            unsafe { bios32::detect(env) }.map(|backend| Box::new(backend) as Box<dyn PciBackend>)
        },
        detect_type1,
    )
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_type1() -> Option<Box<dyn PciBackend>> {
    use crate::legacy::{IoPorts, Type1Backend};

    Type1Backend::<IoPorts>::detect().map(|backend| Box::new(backend) as Box<dyn PciBackend>)
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
const fn detect_type1() -> Option<Box<dyn PciBackend>> {
    None
}

/// Installs an ECAM backend, for platforms that describe their aperture.
pub fn init_ecam<M: PhysicalMapper + 'static>(
    base: PhysAddr,
    segment: u16,
    start_bus: u8,
    end_bus: u8,
) -> PciResult<()> {
    if PCI_BUS.is_configured() {
        return Err(PciError::AlreadyConfigured);
    }

    let backend = EcamBackend::<M>::detect(base, segment, start_bus, end_bus)?;
    PCI_BUS.install(Box::new(backend))
}

#[must_use]
#[inline]
pub fn last_bus() -> Option<u8> {
    PCI_BUS.last_bus()
}

#[must_use]
#[inline]
pub const fn last_segment() -> u16 {
    0
}

#[inline]
pub fn read_config_byte(bdf: BdfAddress, reg: u32) -> PciResult<u8> {
    PCI_BUS.read_config_byte(bdf, reg)
}

#[inline]
pub fn read_config_half(bdf: BdfAddress, reg: u32) -> PciResult<u16> {
    PCI_BUS.read_config_half(bdf, reg)
}

#[inline]
pub fn read_config_word(bdf: BdfAddress, reg: u32) -> PciResult<u32> {
    PCI_BUS.read_config_word(bdf, reg)
}

#[inline]
pub fn write_config_byte(bdf: BdfAddress, reg: u32, value: u8) -> PciResult<()> {
    PCI_BUS.write_config_byte(bdf, reg, value)
}

#[inline]
pub fn write_config_half(bdf: BdfAddress, reg: u32, value: u16) -> PciResult<()> {
    PCI_BUS.write_config_half(bdf, reg, value)
}

#[inline]
pub fn write_config_word(bdf: BdfAddress, reg: u32, value: u32) -> PciResult<()> {
    PCI_BUS.write_config_word(bdf, reg, value)
}

#[inline]
pub fn find_pci_device(device_id: u16, vendor_id: u16, index: u16) -> PciResult<BdfAddress> {
    PCI_BUS.find_pci_device(device_id, vendor_id, index)
}

#[inline]
pub fn find_pci_class_code(class_code: u32, index: u16) -> PciResult<BdfAddress> {
    PCI_BUS.find_pci_class_code(class_code, index)
}

#[inline]
pub fn get_irq_routing_options(entries: &mut [IrqRoutingEntry]) -> PciResult<IrqRouting> {
    PCI_BUS.get_irq_routing_options(entries)
}

#[inline]
pub fn set_irq_hw_int(bdf: BdfAddress, int_pin: u8, irq: u8) -> PciResult<()> {
    PCI_BUS.set_irq_hw_int(bdf, int_pin, irq)
}

#[inline]
pub fn read_config(bdf: BdfAddress) -> PciResult<ConfigHeader> {
    PCI_BUS.read_config(bdf)
}

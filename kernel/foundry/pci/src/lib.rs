//! PCI configuration space access.
//!
//! Three mechanisms can reach the configuration space of PCI functions:
//! the PCI BIOS (located through the BIOS32 service directory), the
//! memory-mapped ECAM aperture and the legacy Type 1 I/O ports.
//! Each of them is a [`PciBackend`]; exactly one is selected at boot and
//! installed in the process-wide bus facade, which serializes every access.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

extern crate alloc;

pub mod bios32;
mod bus;
pub mod commons;
mod error;
pub mod express;
pub mod header;
pub mod legacy;

pub use bus::{
    PciBus, find_pci_class_code, find_pci_device, get_irq_routing_options, init, init_ecam,
    last_bus, last_segment, read_config, read_config_byte, read_config_half, read_config_word,
    set_irq_hw_int, write_config_byte, write_config_half, write_config_word,
};
pub use commons::{BdfAddress, IrqLink, IrqRouting, IrqRoutingEntry, RegisterOffset};
pub use error::{BiosStatus, PciError, PciResult};
pub use header::ConfigHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Configuration space access mechanism.
pub enum BackendKind {
    /// PCI BIOS, through the BIOS32 service directory.
    Bios32,
    /// Enhanced Configuration Access Mechanism.
    Ecam,
    /// Configuration Mechanism #1, through I/O ports `0xCF8`/`0xCFC`.
    Type1,
}

impl core::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Bios32 => "bios",
            Self::Ecam => "ecam",
            Self::Type1 => "type1",
        })
    }
}

/// A PCI configuration space access mechanism.
///
/// Every operation defaults to [`PciError::NotConfigured`], backends only
/// override what their mechanism supports.
///
/// Backends are not reentrant: callers must serialize accesses, which is what
/// [`PciBus`] does.
pub trait PciBackend: Send + Sync {
    #[must_use]
    fn kind(&self) -> BackendKind;

    #[must_use]
    /// Highest bus number reachable through this backend.
    fn last_bus(&self) -> u8;

    fn read_config_byte(&self, _bdf: BdfAddress, _reg: u32) -> PciResult<u8> {
        Err(PciError::NotConfigured)
    }

    fn read_config_half(&self, _bdf: BdfAddress, _reg: u32) -> PciResult<u16> {
        Err(PciError::NotConfigured)
    }

    fn read_config_word(&self, _bdf: BdfAddress, _reg: u32) -> PciResult<u32> {
        Err(PciError::NotConfigured)
    }

    fn write_config_byte(&self, _bdf: BdfAddress, _reg: u32, _value: u8) -> PciResult<()> {
        Err(PciError::NotConfigured)
    }

    fn write_config_half(&self, _bdf: BdfAddress, _reg: u32, _value: u16) -> PciResult<()> {
        Err(PciError::NotConfigured)
    }

    fn write_config_word(&self, _bdf: BdfAddress, _reg: u32, _value: u32) -> PciResult<()> {
        Err(PciError::NotConfigured)
    }

    /// Finds the `index`-th function with the given device and vendor IDs.
    fn find_pci_device(
        &self,
        _device_id: u16,
        _vendor_id: u16,
        _index: u16,
    ) -> PciResult<BdfAddress> {
        Err(PciError::NotConfigured)
    }

    /// Finds the `index`-th function with the given class code
    /// (`class << 16 | subclass << 8 | prog_if`).
    fn find_pci_class_code(&self, _class_code: u32, _index: u16) -> PciResult<BdfAddress> {
        Err(PciError::NotConfigured)
    }

    /// Copies the IRQ routing table into `entries`.
    fn get_irq_routing_options(&self, _entries: &mut [IrqRoutingEntry]) -> PciResult<IrqRouting> {
        Err(PciError::NotConfigured)
    }

    /// Routes interrupt pin `int_pin` (1 = INTA#) of `bdf` to `irq`.
    fn set_irq_hw_int(&self, _bdf: BdfAddress, _int_pin: u8, _irq: u8) -> PciResult<()> {
        Err(PciError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl PciBackend for Bare {
        fn kind(&self) -> BackendKind {
            BackendKind::Type1
        }

        fn last_bus(&self) -> u8 {
            0
        }
    }

    #[test]
    fn test_defaults_are_not_configured() {
        let bdf = BdfAddress::new(0, 1, 0);
        let backend = Bare;

        assert_eq!(backend.read_config_byte(bdf, 0), Err(PciError::NotConfigured));
        assert_eq!(backend.read_config_half(bdf, 0), Err(PciError::NotConfigured));
        assert_eq!(backend.read_config_word(bdf, 0), Err(PciError::NotConfigured));
        assert_eq!(
            backend.write_config_byte(bdf, 0, 1),
            Err(PciError::NotConfigured)
        );
        assert_eq!(
            backend.write_config_half(bdf, 0, 1),
            Err(PciError::NotConfigured)
        );
        assert_eq!(
            backend.write_config_word(bdf, 0, 1),
            Err(PciError::NotConfigured)
        );
        assert_eq!(
            backend.find_pci_device(0x1234, 0x8086, 0),
            Err(PciError::NotConfigured)
        );
        assert_eq!(
            backend.find_pci_class_code(0x01_06_01, 0),
            Err(PciError::NotConfigured)
        );
        assert_eq!(
            backend.get_irq_routing_options(&mut []),
            Err(PciError::NotConfigured)
        );
        assert_eq!(backend.set_irq_hw_int(bdf, 1, 11), Err(PciError::NotConfigured));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(BackendKind::Bios32.to_string(), "bios");
        assert_eq!(BackendKind::Ecam.to_string(), "ecam");
        assert_eq!(BackendKind::Type1.to_string(), "type1");
    }
}

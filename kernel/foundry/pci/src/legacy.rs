//! Configuration Mechanism #1.
//!
//! The function and register are selected by writing `CONFIG_ADDRESS`,
//! then the selected dword is transferred through `CONFIG_DATA`.
use crate::{BackendKind, BdfAddress, PciBackend, PciError, PciResult};

pub const CONFIG_ADDRESS: u16 = 0xCF8;
pub const CONFIG_DATA: u16 = 0xCFC;

/// Type 1 has no way of discovering the bus count.
const LAST_BUS: u8 = 32;

/// Raw access to the `CONFIG_ADDRESS`/`CONFIG_DATA` pair.
pub trait ConfigPorts: Send + Sync {
    /// # Safety
    ///
    /// Selects the register accessed by the next data transfer.
    unsafe fn write_address(&self, value: u32);

    #[must_use]
    /// # Safety
    ///
    /// The address must have been written first.
    unsafe fn read_data(&self) -> u32;

    /// # Safety
    ///
    /// The address must have been written first.
    unsafe fn write_data(&self, value: u32);

    /// Writes the half at byte `offset` (0 or 2) of `CONFIG_DATA`.
    ///
    /// # Safety
    ///
    /// The address must have been written first.
    unsafe fn write_data_half(&self, offset: u8, value: u16);

    /// Writes the byte at `offset` (0 to 3) of `CONFIG_DATA`.
    ///
    /// # Safety
    ///
    /// The address must have been written first.
    unsafe fn write_data_byte(&self, offset: u8, value: u8);
}

impl<P: ConfigPorts + ?Sized> ConfigPorts for &P {
    unsafe fn write_address(&self, value: u32) {
        unsafe { (**self).write_address(value) };
    }

    unsafe fn read_data(&self) -> u32 {
        unsafe { (**self).read_data() }
    }

    unsafe fn write_data(&self, value: u32) {
        unsafe { (**self).write_data(value) };
    }

    unsafe fn write_data_half(&self, offset: u8, value: u16) {
        unsafe { (**self).write_data_half(offset, value) };
    }

    unsafe fn write_data_byte(&self, offset: u8, value: u8) {
        unsafe { (**self).write_data_byte(offset, value) };
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use ports::IoPorts;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod ports {
    use super::{CONFIG_ADDRESS, CONFIG_DATA, ConfigPorts};
    use beskar_hal::port::{Port, ReadWrite, WriteOnly};

    #[derive(Debug, Clone, Copy)]
    /// The actual I/O ports.
    pub struct IoPorts {
        address: Port<u32, WriteOnly>,
        data: Port<u32, ReadWrite>,
    }

    impl Default for IoPorts {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IoPorts {
        #[must_use]
        #[inline]
        pub const fn new() -> Self {
            Self {
                address: Port::new(CONFIG_ADDRESS),
                data: Port::new(CONFIG_DATA),
            }
        }
    }

    impl ConfigPorts for IoPorts {
        unsafe fn write_address(&self, value: u32) {
            unsafe { self.address.write(value) };
        }

        unsafe fn read_data(&self) -> u32 {
            unsafe { self.data.read() }
        }

        unsafe fn write_data(&self, value: u32) {
            unsafe { self.data.write(value) };
        }

        unsafe fn write_data_half(&self, offset: u8, value: u16) {
            let port = Port::<u16, WriteOnly>::new(CONFIG_DATA + u16::from(offset));
            unsafe { port.write(value) };
        }

        unsafe fn write_data_byte(&self, offset: u8, value: u8) {
            let port = Port::<u8, WriteOnly>::new(CONFIG_DATA + u16::from(offset));
            unsafe { port.write(value) };
        }
    }
}

#[must_use]
#[inline]
/// `CONFIG_ADDRESS` value selecting the dword containing `reg`.
pub const fn config_address(bdf: BdfAddress, reg: u8) -> u32 {
    let enable = 1 << 31;
    let bus = (bdf.bus() as u32) << 16;
    let device = (bdf.device() as u32) << 11;
    let function = (bdf.function() as u32) << 8;
    let register = (reg & 0xFC) as u32;

    enable | bus | device | function | register
}

/// Checks that `reg` is addressable and aligned for `width` bytes.
fn register(reg: u32, width: u8) -> PciResult<u8> {
    u8::try_from(reg)
        .ok()
        .filter(|reg| reg % width == 0)
        .ok_or(PciError::InvalidRegister(reg))
}

/// Type 1 backend.
pub struct Type1Backend<P: ConfigPorts> {
    ports: P,
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl Type1Backend<IoPorts> {
    #[must_use]
    /// Type 1 is assumed to be present on every PC.
    pub const fn detect() -> Option<Self> {
        Some(Self::new(IoPorts::new()))
    }
}

impl<P: ConfigPorts> Type1Backend<P> {
    #[must_use]
    #[inline]
    pub const fn new(ports: P) -> Self {
        Self { ports }
    }

    fn read_dword(&self, bdf: BdfAddress, reg: u8) -> u32 {
        unsafe {
            self.ports.write_address(config_address(bdf, reg));
            self.ports.read_data()
        }
    }
}

#[expect(clippy::cast_possible_truncation, reason = "Sub-dword extraction")]
impl<P: ConfigPorts> PciBackend for Type1Backend<P> {
    fn kind(&self) -> BackendKind {
        BackendKind::Type1
    }

    fn last_bus(&self) -> u8 {
        LAST_BUS
    }

    fn read_config_byte(&self, bdf: BdfAddress, reg: u32) -> PciResult<u8> {
        let reg = register(reg, 1)?;
        Ok((self.read_dword(bdf, reg) >> ((reg & 3) * 8)) as u8)
    }

    fn read_config_half(&self, bdf: BdfAddress, reg: u32) -> PciResult<u16> {
        let reg = register(reg, 2)?;
        Ok((self.read_dword(bdf, reg) >> ((reg & 2) * 8)) as u16)
    }

    fn read_config_word(&self, bdf: BdfAddress, reg: u32) -> PciResult<u32> {
        let reg = register(reg, 4)?;
        Ok(self.read_dword(bdf, reg))
    }

    fn write_config_byte(&self, bdf: BdfAddress, reg: u32, value: u8) -> PciResult<()> {
        let reg = register(reg, 1)?;
        unsafe {
            self.ports.write_address(config_address(bdf, reg));
            self.ports.write_data_byte(reg & 3, value);
        }
        Ok(())
    }

    fn write_config_half(&self, bdf: BdfAddress, reg: u32, value: u16) -> PciResult<()> {
        let reg = register(reg, 2)?;
        unsafe {
            self.ports.write_address(config_address(bdf, reg));
            self.ports.write_data_half(reg & 2, value);
        }
        Ok(())
    }

    fn write_config_word(&self, bdf: BdfAddress, reg: u32, value: u32) -> PciResult<()> {
        let reg = register(reg, 4)?;
        unsafe {
            self.ports.write_address(config_address(bdf, reg));
            self.ports.write_data(value);
        }
        Ok(())
    }
}

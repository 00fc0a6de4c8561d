//! Decoding of the 64-byte predefined configuration header.
use crate::{BdfAddress, PciBackend, PciError, PciResult, RegisterOffset};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfigHeader {
    pub vendor_id: u16,
    pub device_id: u16,
    pub command: u16,
    pub status: u16,
    pub revision_id: u8,
    pub prog_if: u8,
    pub subclass: u8,
    pub class: u8,
    pub cache_line_size: u8,
    pub latency_timer: u8,
    /// Raw header type, including the multi-function bit.
    pub header_type: u8,
    pub bist: u8,
    pub layout: HeaderLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Type specific part of the header (offsets `0x10..0x40`).
pub enum HeaderLayout {
    /// Header type 0.
    Standard(StandardHeader),
    /// Header type 1.
    Bridge(BridgeHeader),
}

impl Default for HeaderLayout {
    fn default() -> Self {
        Self::Standard(StandardHeader::default())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StandardHeader {
    pub bars: [u32; 6],
    pub cardbus_cis_ptr: u32,
    pub subsystem_vendor_id: u16,
    pub subsystem_id: u16,
    pub expansion_rom_address: u32,
    pub capabilities_ptr: u8,
    pub interrupt_line: u8,
    pub interrupt_pin: u8,
    pub min_grant: u8,
    pub max_latency: u8,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeHeader {
    pub bars: [u32; 2],
    pub primary_bus: u8,
    pub secondary_bus: u8,
    pub subordinate_bus: u8,
    pub secondary_latency_timer: u8,
    pub io_base: u8,
    pub io_limit: u8,
    pub secondary_status: u16,
    pub memory_base: u16,
    pub memory_limit: u16,
    pub prefetchable_memory_base: u16,
    pub prefetchable_memory_limit: u16,
    pub prefetchable_base_upper: u32,
    pub prefetchable_limit_upper: u32,
    pub io_base_upper: u16,
    pub io_limit_upper: u16,
    pub capabilities_ptr: u8,
    pub expansion_rom_address: u32,
    pub interrupt_line: u8,
    pub interrupt_pin: u8,
    pub bridge_control: u16,
}

/// Sequential reader over the configuration space of one function.
struct Cursor<'a, B: ?Sized> {
    backend: &'a B,
    bdf: BdfAddress,
    offset: u32,
}

impl<B: PciBackend + ?Sized> Cursor<'_, B> {
    fn byte(&mut self) -> PciResult<u8> {
        let value = self.backend.read_config_byte(self.bdf, self.offset)?;
        self.offset += 1;
        Ok(value)
    }

    fn half(&mut self) -> PciResult<u16> {
        let value = self.backend.read_config_half(self.bdf, self.offset)?;
        self.offset += 2;
        Ok(value)
    }

    fn word(&mut self) -> PciResult<u32> {
        let value = self.backend.read_config_word(self.bdf, self.offset)?;
        self.offset += 4;
        Ok(value)
    }

    const fn skip(&mut self, bytes: u32) {
        self.offset += bytes;
    }
}

impl ConfigHeader {
    /// Size of the predefined header.
    pub const SIZE: u32 = 0x40;

    /// Reads the header of `bdf`, register by register, using the natural
    /// width of every field.
    pub fn read<B: PciBackend + ?Sized>(backend: &B, bdf: BdfAddress) -> PciResult<Self> {
        let mut cursor = Cursor {
            backend,
            bdf,
            offset: 0,
        };

        let mut header = Self {
            vendor_id: cursor.half()?,
            device_id: cursor.half()?,
            command: cursor.half()?,
            status: cursor.half()?,
            revision_id: cursor.byte()?,
            prog_if: cursor.byte()?,
            subclass: cursor.byte()?,
            class: cursor.byte()?,
            cache_line_size: cursor.byte()?,
            latency_timer: cursor.byte()?,
            header_type: cursor.byte()?,
            bist: cursor.byte()?,
            layout: HeaderLayout::default(),
        };
        debug_assert_eq!(cursor.offset, u32::from(RegisterOffset::Bar0));

        header.layout = match header.header_type & 0x7F {
            0 => HeaderLayout::Standard(read_standard(&mut cursor)?),
            1 => HeaderLayout::Bridge(read_bridge(&mut cursor)?),
            other => return Err(PciError::InvalidHeader(other)),
        };
        debug_assert_eq!(cursor.offset, Self::SIZE);

        Ok(header)
    }

    #[must_use]
    #[inline]
    pub const fn is_multifunction(&self) -> bool {
        self.header_type & 0x80 != 0
    }

    #[must_use]
    #[inline]
    /// Class code as used by `find_pci_class_code`.
    pub const fn class_code(&self) -> u32 {
        ((self.class as u32) << 16) | ((self.subclass as u32) << 8) | self.prog_if as u32
    }
}

fn read_standard<B: PciBackend + ?Sized>(cursor: &mut Cursor<'_, B>) -> PciResult<StandardHeader> {
    let mut bars = [0; 6];
    for bar in &mut bars {
        *bar = cursor.word()?;
    }

    let cardbus_cis_ptr = cursor.word()?;
    let subsystem_vendor_id = cursor.half()?;
    let subsystem_id = cursor.half()?;
    let expansion_rom_address = cursor.word()?;
    let capabilities_ptr = cursor.byte()?;
    cursor.skip(3 + 4);
    debug_assert_eq!(cursor.offset, u32::from(RegisterOffset::InterruptLine));

    Ok(StandardHeader {
        bars,
        cardbus_cis_ptr,
        subsystem_vendor_id,
        subsystem_id,
        expansion_rom_address,
        capabilities_ptr,
        interrupt_line: cursor.byte()?,
        interrupt_pin: cursor.byte()?,
        min_grant: cursor.byte()?,
        max_latency: cursor.byte()?,
    })
}

fn read_bridge<B: PciBackend + ?Sized>(cursor: &mut Cursor<'_, B>) -> PciResult<BridgeHeader> {
    let bars = [cursor.word()?, cursor.word()?];

    let primary_bus = cursor.byte()?;
    let secondary_bus = cursor.byte()?;
    let subordinate_bus = cursor.byte()?;
    let secondary_latency_timer = cursor.byte()?;
    let io_base = cursor.byte()?;
    let io_limit = cursor.byte()?;
    let secondary_status = cursor.half()?;
    let memory_base = cursor.half()?;
    let memory_limit = cursor.half()?;
    let prefetchable_memory_base = cursor.half()?;
    let prefetchable_memory_limit = cursor.half()?;
    let prefetchable_base_upper = cursor.word()?;
    let prefetchable_limit_upper = cursor.word()?;
    let io_base_upper = cursor.half()?;
    let io_limit_upper = cursor.half()?;
    let capabilities_ptr = cursor.byte()?;
    cursor.skip(3);

    Ok(BridgeHeader {
        bars,
        primary_bus,
        secondary_bus,
        subordinate_bus,
        secondary_latency_timer,
        io_base,
        io_limit,
        secondary_status,
        memory_base,
        memory_limit,
        prefetchable_memory_base,
        prefetchable_memory_limit,
        prefetchable_base_upper,
        prefetchable_limit_upper,
        io_base_upper,
        io_limit_upper,
        capabilities_ptr,
        expansion_rom_address: cursor.word()?,
        interrupt_line: cursor.byte()?,
        interrupt_pin: cursor.byte()?,
        bridge_control: cursor.half()?,
    })
}

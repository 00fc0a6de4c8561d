//! PCI common definitions

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Bus, Device, Function address
///
/// Identifies one PCI function. Some interfaces (the PCI BIOS, IRQ routing
/// tables) pack device and function in a single `dev_fn` byte, see
/// `from_dev_fn` and `dev_fn`.
pub struct BdfAddress {
    /// 0-255
    bus: u8,
    /// 0-31
    device: u8,
    /// 0-7
    function: u8,
}

impl BdfAddress {
    #[must_use]
    #[inline]
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        assert!(device <= 0b1_1111, "Device number must be less than 32");
        assert!(function <= 0b111, "Function number must be less than 8");
        Self {
            bus,
            device,
            function,
        }
    }

    #[must_use]
    #[inline]
    /// Builds an address from a `dev_fn` byte (`device << 3 | function`).
    pub const fn from_dev_fn(bus: u8, dev_fn: u8) -> Self {
        Self {
            bus,
            device: dev_fn >> 3,
            function: dev_fn & 0b111,
        }
    }

    #[must_use]
    #[inline]
    pub const fn bus(self) -> u8 {
        self.bus
    }

    #[must_use]
    #[inline]
    pub const fn device(self) -> u8 {
        self.device
    }

    #[must_use]
    #[inline]
    pub const fn function(self) -> u8 {
        self.function
    }

    #[must_use]
    #[inline]
    pub const fn dev_fn(self) -> u8 {
        (self.device << 3) | self.function
    }
}

impl core::fmt::Display for BdfAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
/// Registers of the standard (type 0) configuration header.
pub enum RegisterOffset {
    VendorId = 0x00,
    DeviceId = 0x02,
    Command = 0x04,
    Status = 0x06,
    RevisionId = 0x08,
    ProgIf = 0x09,
    Subclass = 0x0A,
    Class = 0x0B,
    CacheLineSize = 0x0C,
    LatencyTimer = 0x0D,
    HeaderType = 0x0E,
    Bist = 0x0F,
    Bar0 = 0x10,
    Bar1 = 0x14,
    Bar2 = 0x18,
    Bar3 = 0x1C,
    Bar4 = 0x20,
    Bar5 = 0x24,
    CardbusCisPointer = 0x28,
    SubsystemVendorId = 0x2C,
    SubsystemId = 0x2E,
    ExpansionRomBaseAddress = 0x30,
    CapabilitiesPointer = 0x34,
    InterruptLine = 0x3C,
    InterruptPin = 0x3D,
    MinGrant = 0x3E,
    MaxLatency = 0x3F,
}

impl From<RegisterOffset> for u32 {
    fn from(value: RegisterOffset) -> Self {
        Self::from(value as u8)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
/// One interrupt pin of a slot in the PCI BIOS IRQ routing table.
pub struct IrqLink {
    /// Link value, 0 if the pin is not connected.
    pub link: u8,
    /// IRQs the link can be routed to.
    pub bitmap: u16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
/// Entry of the PCI BIOS IRQ routing table.
pub struct IrqRoutingEntry {
    pub bus: u8,
    pub dev_fn: u8,
    /// INTA# to INTD#.
    pub links: [IrqLink; 4],
    pub slot: u8,
    pub reserved: u8,
}

beskar_hal::static_assert!(size_of::<IrqRoutingEntry>() == 16);

impl IrqRoutingEntry {
    #[must_use]
    #[inline]
    pub const fn location(&self) -> BdfAddress {
        BdfAddress::from_dev_fn(self.bus, self.dev_fn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Result of an IRQ routing table query.
pub struct IrqRouting {
    /// Number of entries written to the caller's buffer.
    pub count: usize,
    /// Bitmap of the IRQs dedicated to PCI.
    pub pci_irqs: u16,
}

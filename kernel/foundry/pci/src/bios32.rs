//! PCI BIOS backend.
//!
//! The BIOS32 service directory is found by scanning the BIOS area for its
//! header. Its entry point is then asked for the `$PCI` service, whose entry
//! point in turn implements the PCI BIOS functions (`0xB1xx`).
//!
//! Every call is a far call, abstracted by [`FarCall`].
use crate::{
    BackendKind, BdfAddress, BiosStatus, IrqRouting, IrqRoutingEntry, PciBackend, PciError,
    PciResult,
};
pub use beskar_hal::bios32::{FarPointer, Registers};

/// First address scanned for the BIOS32 header.
pub const SCAN_START: u32 = 0x000E_0000;
/// End (exclusive) of the scanned area.
pub const SCAN_END: u32 = 0x000F_FFF0;

const HEADER_MAGIC: [u8; 4] = *b"_32_";
const HEADER_SIZE: usize = 16;

/// `$PCI`
const PCI_SERVICE: u32 = u32::from_le_bytes(*b"$PCI");
/// Signature returned in EDX by `PCI_BIOS_PRESENT`.
const PCI_SIGNATURE: u32 = u32::from_le_bytes(*b"PCI ");
/// BIOS32 knows the directory, but not the requested service.
const SERVICE_ABSENT: u8 = 0x80;

const PCI_BIOS_PRESENT: u16 = 0xB101;
const FIND_PCI_DEVICE: u16 = 0xB102;
const FIND_PCI_CLASS_CODE: u16 = 0xB103;
const READ_CONFIG_BYTE: u16 = 0xB108;
const READ_CONFIG_WORD: u16 = 0xB109;
const READ_CONFIG_DWORD: u16 = 0xB10A;
const WRITE_CONFIG_BYTE: u16 = 0xB10B;
const WRITE_CONFIG_WORD: u16 = 0xB10C;
const WRITE_CONFIG_DWORD: u16 = 0xB10D;
const GET_IRQ_ROUTING_OPTIONS: u16 = 0xB10E;
const SET_PCI_IRQ: u16 = 0xB10F;

/// Far call gate into BIOS code.
pub trait FarCall: Send + Sync {
    #[must_use]
    /// Far calls `entry` and returns the registers left by the callee.
    ///
    /// # Safety
    ///
    /// `entry` must be callable BIOS code, and every pointer carried by
    /// `registers` must be valid for the duration of the call.
    unsafe fn far_call(&self, entry: FarPointer, registers: Registers) -> Registers;
}

impl<G: FarCall + ?Sized> FarCall for &G {
    unsafe fn far_call(&self, entry: FarPointer, registers: Registers) -> Registers {
        unsafe { (**self).far_call(entry, registers) }
    }
}

#[cfg(target_arch = "x86")]
#[derive(Debug, Default, Clone, Copy)]
/// The actual BIOS, entered with `lcall`.
pub struct BiosGate;

#[cfg(target_arch = "x86")]
impl FarCall for BiosGate {
    unsafe fn far_call(&self, entry: FarPointer, mut registers: Registers) -> Registers {
        unsafe { beskar_hal::bios32::far_call(&entry, &mut registers) };
        registers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Platform constants needed to reach BIOS code.
pub struct Bios32Environment {
    /// Virtual address at which physical address 0 is mapped.
    pub low_memory_offset: u32,
    /// Flat 32-bit code selector.
    pub code_selector: u16,
    /// Flat 32-bit data selector, used for the IRQ routing buffer.
    pub data_selector: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// BIOS32 service directory header.
pub struct Bios32Header {
    /// Physical address of the directory entry point.
    pub entry: u32,
    pub revision: u8,
    /// Header length, in 16-byte paragraphs.
    pub length: u8,
}

impl Bios32Header {
    fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < HEADER_SIZE || raw[..4] != HEADER_MAGIC {
            return None;
        }

        let checksum = raw[..HEADER_SIZE]
            .iter()
            .fold(0u8, |sum, &byte| sum.wrapping_add(byte));
        if checksum != 0 {
            klog::debug!("PCI: BIOS32 header with bad checksum {:#x}", checksum);
            return None;
        }

        Some(Self {
            entry: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            revision: raw[8],
            length: raw[9],
        })
    }
}

#[must_use]
/// Scans `area` for a valid BIOS32 header, on 16-byte boundaries.
///
/// Returns the offset of the header within `area` along with the header.
pub fn find_header(area: &[u8]) -> Option<(usize, Bios32Header)> {
    area.chunks_exact(HEADER_SIZE)
        .enumerate()
        .find_map(|(i, chunk)| Bios32Header::parse(chunk).map(|header| (i * HEADER_SIZE, header)))
}

#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
/// Buffer descriptor of `GET_IRQ_ROUTING_OPTIONS`.
pub struct IrqRoutingOptions {
    /// Size of the buffer in bytes, updated by the BIOS.
    pub size: u16,
    pub buffer: *mut IrqRoutingEntry,
    pub selector: u16,
}

#[cfg(target_arch = "x86")]
beskar_hal::static_assert!(size_of::<IrqRoutingOptions>() == 8);

const ROUTING_ENTRY_SIZE: usize = size_of::<IrqRoutingEntry>();

/// PCI BIOS backend.
pub struct Bios32Backend<G: FarCall> {
    gate: G,
    /// Entry point of the PCI BIOS service.
    entry: FarPointer,
    data_selector: u16,
    last_bus: u8,
}

#[cfg(target_arch = "x86")]
#[must_use]
/// Looks for the PCI BIOS in the BIOS area.
///
/// # Safety
///
/// The first megabyte of physical memory must be mapped at
/// `env.low_memory_offset`, and `env.code_selector` must be a flat code
/// selector.
pub unsafe fn detect(env: Bios32Environment) -> Option<Bios32Backend<BiosGate>> {
    let start = SCAN_START.checked_add(env.low_memory_offset)?;
    let len = usize::try_from(SCAN_END - SCAN_START).ok()?;

    // Safety:
    // The BIOS area is mapped, as guaranteed by the caller.
    let area = unsafe { core::slice::from_raw_parts(start as usize as *const u8, len) };
    let (offset, header) = find_header(area)?;

    klog::info!(
        "PCI: found BIOS32 structure at {:#x}",
        SCAN_START as usize + offset
    );
    klog::debug!(
        "PCI: BIOS32 entry {:#x} revision {} len {}",
        header.entry,
        header.revision,
        usize::from(header.length) * 16
    );

    unsafe { Bios32Backend::from_header(BiosGate, header, env) }
}

#[cfg(not(target_arch = "x86"))]
#[must_use]
/// The PCI BIOS cannot be called from this architecture.
///
/// # Safety
///
/// Always safe, the signature mirrors the x86 version.
pub const unsafe fn detect(_env: Bios32Environment) -> Option<Bios32Backend<NoGate>> {
    None
}

#[cfg(not(target_arch = "x86"))]
#[derive(Debug, Clone, Copy)]
/// Placeholder gate for architectures without BIOS32.
pub enum NoGate {}

#[cfg(not(target_arch = "x86"))]
impl FarCall for NoGate {
    unsafe fn far_call(&self, _entry: FarPointer, _registers: Registers) -> Registers {
        match *self {}
    }
}

/// Status of a PCI BIOS function: AH when the carry flag is set, success otherwise.
const fn function_status(registers: &Registers) -> u8 {
    if registers.carry() { registers.ah() } else { 0 }
}

#[expect(clippy::cast_possible_truncation, reason = "Register slicing")]
const fn bx_to_bdf(ebx: usize) -> BdfAddress {
    BdfAddress::from_dev_fn((ebx >> 8) as u8, ebx as u8)
}

const fn bdf_to_bx(bdf: BdfAddress) -> usize {
    ((bdf.bus() as usize) << 8) | bdf.dev_fn() as usize
}

impl<G: FarCall> Bios32Backend<G> {
    /// Locates the PCI BIOS through the BIOS32 directory described by `header`.
    ///
    /// # Safety
    ///
    /// `header` must describe the BIOS32 directory of this machine, reachable
    /// through `gate` with the selectors of `env`.
    pub unsafe fn from_header(gate: G, header: Bios32Header, env: Bios32Environment) -> Option<Self> {
        let directory = FarPointer::new(
            header.entry.wrapping_add(env.low_memory_offset),
            env.code_selector,
        );

        let located = unsafe {
            gate.far_call(
                directory,
                Registers {
                    eax: PCI_SERVICE as usize,
                    ebx: 0,
                    ..Registers::default()
                },
            )
        };

        match located.al() {
            0 => {}
            SERVICE_ABSENT => {
                klog::info!("PCI: BIOS32 found, but no PCI BIOS");
                return None;
            }
            status => {
                klog::info!("PCI: BIOS32 call to locate PCI BIOS returned {:#x}", status);
                return None;
            }
        }

        #[expect(clippy::cast_possible_truncation, reason = "32-bit registers")]
        let (base, offset) = (located.ebx as u32, located.edx as u32);
        klog::debug!("PCI: BIOS32 entry segment base {:#x} offset {:#x}", base, offset);

        let entry = FarPointer::new(
            base.wrapping_add(offset).wrapping_add(env.low_memory_offset),
            env.code_selector,
        );

        let present = unsafe {
            gate.far_call(
                entry,
                Registers {
                    eax: usize::from(PCI_BIOS_PRESENT),
                    ..Registers::default()
                },
            )
        };
        klog::debug!(
            "PCI: PCI_BIOS_PRESENT returned eax {:#x} ebx {:#x} ecx {:#x} edx {:#x}",
            present.eax,
            present.ebx,
            present.ecx,
            present.edx
        );

        let status = function_status(&present);
        if status != 0 {
            klog::info!("PCI: PCI_BIOS_PRESENT call returned ah={:#04x}", status);
            return None;
        }

        if present.edx & 0xFFFF_FFFF != PCI_SIGNATURE as usize {
            klog::info!("PCI: PCI_BIOS_PRESENT call returned edx={:#010x}", present.edx);
            return None;
        }

        #[expect(clippy::cast_possible_truncation, reason = "Last bus is in CL")]
        let last_bus = present.ecx as u8;

        Some(Self {
            gate,
            entry,
            data_selector: env.data_selector,
            last_bus,
        })
    }

    #[must_use]
    #[inline]
    pub const fn entry(&self) -> FarPointer {
        self.entry
    }

    /// Calls PCI BIOS `function`, failing on a non-zero status.
    fn call(&self, function: u16, mut registers: Registers) -> PciResult<Registers> {
        registers.eax = usize::from(function);

        // Safety:
        // The entry point was validated by `PCI_BIOS_PRESENT`, and callers
        // only pass pointers to live values.
        let registers = unsafe { self.gate.far_call(self.entry, registers) };

        match function_status(&registers) {
            0 => Ok(registers),
            status => Err(PciError::Bios(BiosStatus::from(status))),
        }
    }

    fn read_config(&self, function: u16, bdf: BdfAddress, reg: u32) -> PciResult<usize> {
        let registers = self.call(
            function,
            Registers {
                ebx: bdf_to_bx(bdf),
                edi: reg as usize,
                ..Registers::default()
            },
        )?;
        Ok(registers.ecx)
    }

    fn write_config(&self, function: u16, bdf: BdfAddress, reg: u32, value: u32) -> PciResult<()> {
        self.call(
            function,
            Registers {
                ebx: bdf_to_bx(bdf),
                ecx: value as usize,
                edi: reg as usize,
                ..Registers::default()
            },
        )
        .map(|_| ())
    }
}

#[expect(clippy::cast_possible_truncation, reason = "Values are returned in CL/CX/ECX")]
impl<G: FarCall> PciBackend for Bios32Backend<G> {
    fn kind(&self) -> BackendKind {
        BackendKind::Bios32
    }

    fn last_bus(&self) -> u8 {
        self.last_bus
    }

    fn read_config_byte(&self, bdf: BdfAddress, reg: u32) -> PciResult<u8> {
        self.read_config(READ_CONFIG_BYTE, bdf, reg).map(|ecx| ecx as u8)
    }

    fn read_config_half(&self, bdf: BdfAddress, reg: u32) -> PciResult<u16> {
        self.read_config(READ_CONFIG_WORD, bdf, reg).map(|ecx| ecx as u16)
    }

    fn read_config_word(&self, bdf: BdfAddress, reg: u32) -> PciResult<u32> {
        self.read_config(READ_CONFIG_DWORD, bdf, reg).map(|ecx| ecx as u32)
    }

    fn write_config_byte(&self, bdf: BdfAddress, reg: u32, value: u8) -> PciResult<()> {
        self.write_config(WRITE_CONFIG_BYTE, bdf, reg, u32::from(value))
    }

    fn write_config_half(&self, bdf: BdfAddress, reg: u32, value: u16) -> PciResult<()> {
        self.write_config(WRITE_CONFIG_WORD, bdf, reg, u32::from(value))
    }

    fn write_config_word(&self, bdf: BdfAddress, reg: u32, value: u32) -> PciResult<()> {
        self.write_config(WRITE_CONFIG_DWORD, bdf, reg, value)
    }

    fn find_pci_device(&self, device_id: u16, vendor_id: u16, index: u16) -> PciResult<BdfAddress> {
        let registers = self.call(
            FIND_PCI_DEVICE,
            Registers {
                ecx: usize::from(device_id),
                edx: usize::from(vendor_id),
                esi: usize::from(index),
                ..Registers::default()
            },
        )?;
        Ok(bx_to_bdf(registers.ebx))
    }

    fn find_pci_class_code(&self, class_code: u32, index: u16) -> PciResult<BdfAddress> {
        let registers = self.call(
            FIND_PCI_CLASS_CODE,
            Registers {
                ecx: class_code as usize,
                esi: usize::from(index),
                ..Registers::default()
            },
        )?;
        Ok(bx_to_bdf(registers.ebx))
    }

    fn get_irq_routing_options(&self, entries: &mut [IrqRoutingEntry]) -> PciResult<IrqRouting> {
        let capacity = entries.len().min(usize::from(u16::MAX) / ROUTING_ENTRY_SIZE);
        let mut options = IrqRoutingOptions {
            size: (capacity * ROUTING_ENTRY_SIZE) as u16,
            buffer: entries.as_mut_ptr(),
            selector: self.data_selector,
        };

        let result = self.call(
            GET_IRQ_ROUTING_OPTIONS,
            Registers {
                ebx: 0,
                edi: core::ptr::from_mut(&mut options) as usize,
                ..Registers::default()
            },
        );

        let size = usize::from(options.size);
        match result {
            Ok(registers) => Ok(IrqRouting {
                count: (size / ROUTING_ENTRY_SIZE).min(capacity),
                pci_irqs: registers.ebx as u16,
            }),
            Err(PciError::Bios(BiosStatus::BufferTooSmall)) => Err(PciError::RoutingBufferTooSmall {
                required: size.div_ceil(ROUTING_ENTRY_SIZE),
            }),
            Err(err) => Err(err),
        }
    }

    fn set_irq_hw_int(&self, bdf: BdfAddress, int_pin: u8, irq: u8) -> PciResult<()> {
        self.call(
            SET_PCI_IRQ,
            Registers {
                ebx: bdf_to_bx(bdf),
                ecx: (usize::from(irq) << 8) | usize::from(int_pin),
                ..Registers::default()
            },
        )
        .map(|_| ())
    }
}

//! Hardware doubles shared by the integration tests.
#![allow(dead_code)]

use driver_api::{MappingFlags, PhysAddr, PhysicalMapper};
use pci::bios32::{Bios32Environment, Bios32Header, FarCall, FarPointer, IrqRoutingOptions, Registers};
use pci::legacy::ConfigPorts;
use pci::IrqRoutingEntry;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

// BIOS32

pub const DIRECTORY_ENTRY: u32 = 0x000F_D000;
pub const SERVICE_BASE: u32 = 0x000F_0000;
pub const SERVICE_OFFSET: u32 = 0xE000;
pub const LOW_MEMORY: u32 = 0xC000_0000;

pub const ENV: Bios32Environment = Bios32Environment {
    low_memory_offset: LOW_MEMORY,
    code_selector: 0x08,
    data_selector: 0x10,
};

pub const HEADER: Bios32Header = Bios32Header {
    entry: DIRECTORY_ENTRY,
    revision: 0,
    length: 1,
};

const CARRY: usize = Registers::CARRY;

#[derive(Debug, Clone, Copy)]
pub struct MockDevice {
    pub vendor_id: u16,
    pub device_id: u16,
    pub class_code: u32,
    /// `bus << 8 | dev_fn`
    pub bx: u16,
}

/// Emulates a BIOS32 directory exposing a PCI BIOS.
pub struct MockBios {
    /// AL returned when locating `$PCI`.
    pub locate_status: u8,
    /// AH returned with carry by `PCI_BIOS_PRESENT`, 0 for success.
    pub present_status: u8,
    pub signature: u32,
    pub last_bus: u8,
    pub devices: Vec<MockDevice>,
    pub routing: Vec<IrqRoutingEntry>,
    pub pci_irqs: u16,
    /// Table size reported by a BIOS that succeeds whatever the buffer size.
    pub reported_size: Option<u16>,
    pub config: Mutex<HashMap<(usize, usize), u8>>,
    /// `(ebx, ecx)` of every `SET_PCI_IRQ` call.
    pub irq_assignments: Mutex<Vec<(usize, usize)>>,
    /// Targets of every far call.
    pub calls: Mutex<Vec<FarPointer>>,
}

impl Default for MockBios {
    fn default() -> Self {
        Self {
            locate_status: 0,
            present_status: 0,
            signature: u32::from_le_bytes(*b"PCI "),
            last_bus: 4,
            devices: Vec::new(),
            routing: Vec::new(),
            pci_irqs: 0,
            reported_size: None,
            config: Mutex::new(HashMap::new()),
            irq_assignments: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

const fn fail(status: u8) -> Registers {
    Registers {
        eax: (status as usize) << 8,
        ebx: 0,
        ecx: 0,
        edx: 0,
        esi: 0,
        edi: 0,
        eflags: CARRY,
    }
}

impl MockBios {
    pub fn directory() -> FarPointer {
        FarPointer::new(DIRECTORY_ENTRY + LOW_MEMORY, ENV.code_selector)
    }

    pub fn service() -> FarPointer {
        FarPointer::new(SERVICE_BASE + SERVICE_OFFSET + LOW_MEMORY, ENV.code_selector)
    }

    fn locate(&self, registers: Registers) -> Registers {
        if registers.eax != 0x4943_5024 || registers.ebx != 0 || self.locate_status != 0 {
            let status = if self.locate_status == 0 { 0x80 } else { self.locate_status };
            return Registers {
                eax: 0xFFFF_FF00 | usize::from(status),
                ..Registers::default()
            };
        }

        Registers {
            eax: 0,
            ebx: SERVICE_BASE as usize,
            ecx: 0x1_0000,
            edx: SERVICE_OFFSET as usize,
            ..Registers::default()
        }
    }

    fn read(&self, registers: &Registers, width: usize) -> Registers {
        if registers.edi % width != 0 || registers.edi + width > 256 {
            return fail(0x87);
        }
        let config = self.config.lock().unwrap();
        let value = (0..width).fold(0usize, |value, i| {
            let byte = config.get(&(registers.ebx, registers.edi + i)).copied().unwrap_or(0);
            value | (usize::from(byte) << (i * 8))
        });
        Registers {
            // Leave garbage in AH, it must be ignored without carry.
            eax: 0x5A00,
            ecx: value,
            ..*registers
        }
    }

    fn write(&self, registers: &Registers, width: usize) -> Registers {
        if registers.edi % width != 0 || registers.edi + width > 256 {
            return fail(0x87);
        }
        let mut config = self.config.lock().unwrap();
        for i in 0..width {
            config.insert(
                (registers.ebx, registers.edi + i),
                u8::try_from((registers.ecx >> (i * 8)) & 0xFF).unwrap(),
            );
        }
        Registers {
            eax: 0,
            ..*registers
        }
    }

    fn find(&self, registers: &Registers, matches: impl Fn(&MockDevice) -> bool) -> Registers {
        self.devices
            .iter()
            .filter(|device| matches(device))
            .nth(registers.esi)
            .map_or_else(
                || fail(0x86),
                |device| Registers {
                    eax: 0,
                    ebx: usize::from(device.bx),
                    ..*registers
                },
            )
    }

    fn routing_options(&self, registers: &Registers) -> Registers {
        let options = registers.edi as *mut IrqRoutingOptions;
        let required = self.routing.len() * size_of::<IrqRoutingEntry>();

        // Safety: The backend passes a pointer to a live descriptor.
        let mut descriptor = unsafe { options.read_unaligned() };
        let available = usize::from(descriptor.size);
        descriptor.size = self
            .reported_size
            .unwrap_or_else(|| u16::try_from(required).unwrap());

        let result = if available < required && self.reported_size.is_none() {
            fail(0x89)
        } else {
            let selector = descriptor.selector;
            assert_eq!(selector, ENV.data_selector);
            let buffer = descriptor.buffer;
            let fits = available / size_of::<IrqRoutingEntry>();
            for (i, entry) in self.routing.iter().take(fits).enumerate() {
                unsafe { buffer.add(i).write_unaligned(*entry) };
            }
            Registers {
                eax: 0,
                ebx: usize::from(self.pci_irqs),
                ..*registers
            }
        };

        unsafe { options.write_unaligned(descriptor) };
        result
    }

    fn service_call(&self, registers: Registers) -> Registers {
        match registers.eax & 0xFFFF {
            0xB101 if self.present_status != 0 => fail(self.present_status),
            0xB101 => Registers {
                eax: 0x0001,
                ebx: 0x0210,
                ecx: 0xAB00 | usize::from(self.last_bus),
                edx: self.signature as usize,
                ..Registers::default()
            },
            0xB102 => self.find(&registers, |device| {
                usize::from(device.device_id) == registers.ecx
                    && usize::from(device.vendor_id) == registers.edx
            }),
            0xB103 => self.find(&registers, |device| device.class_code as usize == registers.ecx),
            0xB108 => self.read(&registers, 1),
            0xB109 => self.read(&registers, 2),
            0xB10A => self.read(&registers, 4),
            0xB10B => self.write(&registers, 1),
            0xB10C => self.write(&registers, 2),
            0xB10D => self.write(&registers, 4),
            0xB10E => self.routing_options(&registers),
            0xB10F => {
                self.irq_assignments
                    .lock()
                    .unwrap()
                    .push((registers.ebx, registers.ecx));
                Registers {
                    eax: 0,
                    ..registers
                }
            }
            _ => fail(0x81),
        }
    }
}

impl FarCall for MockBios {
    unsafe fn far_call(&self, entry: FarPointer, registers: Registers) -> Registers {
        self.calls.lock().unwrap().push(entry);

        if entry == Self::directory() {
            self.locate(registers)
        } else if entry == Self::service() {
            self.service_call(registers)
        } else {
            panic!("Far call to unknown entry {entry:?}");
        }
    }
}

// Type 1

/// Port pair in front of a flat configuration space, which counts
/// address writes that were not followed by a data transfer.
#[derive(Default)]
pub struct MockPorts {
    pending: AtomicBool,
    selected: AtomicU32,
    pub overlaps: AtomicUsize,
    space: Mutex<HashMap<u32, u32>>,
}

impl MockPorts {
    fn complete(&self) -> u32 {
        self.pending.store(false, Ordering::SeqCst);
        self.selected.load(Ordering::SeqCst)
    }

    fn update(&self, mask: u32, value: u32) {
        let address = self.complete();
        let mut space = self.space.lock().unwrap();
        let dword = space.entry(address).or_insert(0);
        *dword = (*dword & !mask) | (value & mask);
    }
}

impl ConfigPorts for MockPorts {
    unsafe fn write_address(&self, value: u32) {
        if self.pending.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.selected.store(value, Ordering::SeqCst);
        // Widen the window between the two halves of a transaction.
        std::thread::yield_now();
    }

    unsafe fn read_data(&self) -> u32 {
        let address = self.complete();
        self.space.lock().unwrap().get(&address).copied().unwrap_or(u32::MAX)
    }

    unsafe fn write_data(&self, value: u32) {
        self.update(u32::MAX, value);
    }

    unsafe fn write_data_half(&self, offset: u8, value: u16) {
        let shift = u32::from(offset) * 8;
        self.update(0xFFFF << shift, u32::from(value) << shift);
    }

    unsafe fn write_data_byte(&self, offset: u8, value: u8) {
        let shift = u32::from(offset) * 8;
        self.update(0xFF << shift, u32::from(value) << shift);
    }
}

// ECAM

#[derive(Debug, Clone, Copy)]
pub struct MappingRecord {
    pub paddr: PhysAddr,
    pub length: usize,
    pub alignment: usize,
    pub flags: MappingFlags,
    pub vaddr: usize,
}

thread_local! {
    static MAPPINGS: RefCell<Vec<MappingRecord>> = const { RefCell::new(Vec::new()) };
    static UNMAPPED: Cell<usize> = const { Cell::new(0) };
}

/// Mappings made by the current thread.
pub fn mappings() -> Vec<MappingRecord> {
    MAPPINGS.with_borrow(Clone::clone)
}

/// Number of mappings released by the current thread.
pub fn unmapped() -> usize {
    UNMAPPED.get()
}

/// Physical memory emulated by a heap buffer.
pub struct MockMapper {
    paddr: PhysAddr,
    memory: NonNull<[u32]>,
}

// Safety: The buffer is owned by the mapping.
unsafe impl Send for MockMapper {}
unsafe impl Sync for MockMapper {}

impl PhysicalMapper for MockMapper {
    fn map(paddr: PhysAddr, length: usize, alignment: usize, flags: MappingFlags) -> Option<Self> {
        let memory = NonNull::from(Box::leak(vec![0u32; length / 4].into_boxed_slice()));
        MAPPINGS.with_borrow_mut(|mappings| {
            mappings.push(MappingRecord {
                paddr,
                length,
                alignment,
                flags,
                vaddr: memory.cast::<u8>().as_ptr() as usize,
            });
        });
        Some(Self { paddr, memory })
    }

    fn translate(&self, paddr: PhysAddr) -> Option<NonNull<u8>> {
        let offset = usize::try_from(paddr.as_u64().checked_sub(self.paddr.as_u64())?).ok()?;
        if offset >= self.memory.len() * 4 {
            return None;
        }
        // Safety: The offset is within the buffer.
        Some(unsafe { self.memory.cast::<u8>().add(offset) })
    }
}

impl Drop for MockMapper {
    fn drop(&mut self) {
        // Safety: The buffer was leaked from a box in `map`.
        drop(unsafe { Box::from_raw(self.memory.as_ptr()) });
        UNMAPPED.set(UNMAPPED.get() + 1);
    }
}

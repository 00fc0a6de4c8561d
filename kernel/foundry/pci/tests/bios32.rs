mod common;

use common::{ENV, HEADER, MockBios, MockDevice};
use pci::bios32::{Bios32Backend, FarPointer};
use pci::{BackendKind, BdfAddress, BiosStatus, IrqLink, IrqRoutingEntry, PciBackend, PciError};

fn detect(bios: &MockBios) -> Option<Bios32Backend<&MockBios>> {
    unsafe { Bios32Backend::from_header(bios, HEADER, ENV) }
}

#[test]
fn test_detect() {
    let bios = MockBios::default();
    let backend = detect(&bios).unwrap();

    assert_eq!(backend.kind(), BackendKind::Bios32);
    assert_eq!(backend.last_bus(), 4);
    assert_eq!(backend.entry(), MockBios::service());

    let calls = bios.calls.lock().unwrap();
    assert_eq!(*calls, [MockBios::directory(), MockBios::service()]);
    let directory = calls[0];
    let offset = directory.offset;
    assert_eq!(offset, 0xC00F_D000);
}

#[test]
fn test_service_absent() {
    let bios = MockBios {
        locate_status: 0x80,
        ..MockBios::default()
    };
    assert!(detect(&bios).is_none());
    // The PCI BIOS is never entered.
    assert_eq!(*bios.calls.lock().unwrap(), [MockBios::directory()]);
}

#[test]
fn test_locate_error() {
    let bios = MockBios {
        locate_status: 0x81,
        ..MockBios::default()
    };
    assert!(detect(&bios).is_none());
}

#[test]
fn test_not_present() {
    let bios = MockBios {
        present_status: 0x81,
        ..MockBios::default()
    };
    assert!(detect(&bios).is_none());
}

#[test]
fn test_bad_signature() {
    let bios = MockBios {
        signature: u32::from_le_bytes(*b"PCJ "),
        ..MockBios::default()
    };
    assert!(detect(&bios).is_none());
}

#[test]
fn test_config_round_trip() {
    let bios = MockBios::default();
    let backend = detect(&bios).unwrap();
    let bdf = BdfAddress::new(2, 5, 1);

    backend.write_config_word(bdf, 0x10, 0xFEBF_0000).unwrap();
    assert_eq!(backend.read_config_word(bdf, 0x10), Ok(0xFEBF_0000));

    backend.write_config_half(bdf, 0x04, 0x0507).unwrap();
    assert_eq!(backend.read_config_half(bdf, 0x04), Ok(0x0507));

    backend.write_config_byte(bdf, 0x3C, 11).unwrap();
    assert_eq!(backend.read_config_byte(bdf, 0x3C), Ok(11));
    assert_eq!(backend.read_config_word(bdf, 0x3C), Ok(11));

    // Other functions are untouched.
    assert_eq!(backend.read_config_word(BdfAddress::new(2, 5, 0), 0x10), Ok(0));
}

#[test]
fn test_bios_error() {
    let bios = MockBios::default();
    let backend = detect(&bios).unwrap();
    let bdf = BdfAddress::new(0, 0, 0);

    let err = backend.read_config_word(bdf, 0x02).unwrap_err();
    assert_eq!(err, PciError::Bios(BiosStatus::BadRegisterNumber));
    assert_eq!(err.status_code(), 0x87);
    assert_eq!(
        backend.write_config_half(bdf, 0x101, 0),
        Err(PciError::Bios(BiosStatus::BadRegisterNumber))
    );
}

#[test]
fn test_find() {
    let bios = MockBios {
        devices: vec![
            MockDevice {
                vendor_id: 0x8086,
                device_id: 0x100E,
                class_code: 0x02_00_00,
                bx: 0x0018,
            },
            MockDevice {
                vendor_id: 0x8086,
                device_id: 0x7010,
                class_code: 0x01_01_80,
                bx: 0x0009,
            },
            MockDevice {
                vendor_id: 0x8086,
                device_id: 0x100E,
                class_code: 0x02_00_00,
                bx: 0x0320,
            },
        ],
        ..MockBios::default()
    };
    let backend = detect(&bios).unwrap();

    assert_eq!(
        backend.find_pci_device(0x100E, 0x8086, 0),
        Ok(BdfAddress::new(0, 3, 0))
    );
    assert_eq!(
        backend.find_pci_device(0x100E, 0x8086, 1),
        Ok(BdfAddress::new(3, 4, 0))
    );
    assert_eq!(
        backend.find_pci_device(0x100E, 0x8086, 2),
        Err(PciError::Bios(BiosStatus::DeviceNotFound))
    );
    assert_eq!(
        backend.find_pci_class_code(0x01_01_80, 0),
        Ok(BdfAddress::new(0, 1, 1))
    );
    assert_eq!(
        backend.find_pci_device(0x1234, 0x1AF4, 0),
        Err(PciError::Bios(BiosStatus::DeviceNotFound))
    );
}

fn routing_entry(device: u8, link: u8) -> IrqRoutingEntry {
    IrqRoutingEntry {
        bus: 0,
        dev_fn: device << 3,
        links: [IrqLink {
            link,
            bitmap: 0xDEB8,
        }; 4],
        slot: device,
        reserved: 0,
    }
}

#[test]
fn test_irq_routing() {
    let routing = vec![routing_entry(1, 0x60), routing_entry(2, 0x61), routing_entry(3, 0x62)];
    let bios = MockBios {
        routing: routing.clone(),
        pci_irqs: 0x0C00,
        ..MockBios::default()
    };
    let backend = detect(&bios).unwrap();

    let mut small = [IrqRoutingEntry::default(); 2];
    let err = backend.get_irq_routing_options(&mut small).unwrap_err();
    assert_eq!(err, PciError::RoutingBufferTooSmall { required: 3 });
    assert_eq!(err.status_code(), 0x89);

    let mut entries = [IrqRoutingEntry::default(); 8];
    let result = backend.get_irq_routing_options(&mut entries).unwrap();
    assert_eq!(result.count, 3);
    assert_eq!(result.pci_irqs, 0x0C00);
    assert_eq!(&entries[..3], routing.as_slice());
    assert_eq!(entries[1].location(), BdfAddress::new(0, 2, 0));
    assert_eq!(entries[3], IrqRoutingEntry::default());
}

#[test]
fn test_irq_routing_count_fits_buffer() {
    let routing = vec![routing_entry(1, 0x60), routing_entry(2, 0x61)];
    let bios = MockBios {
        routing: routing.clone(),
        reported_size: Some(80),
        ..MockBios::default()
    };
    let backend = detect(&bios).unwrap();

    let mut entries = [IrqRoutingEntry::default(); 2];
    let result = backend.get_irq_routing_options(&mut entries).unwrap();
    assert_eq!(result.count, entries.len());
    assert_eq!(&entries[..result.count], routing.as_slice());
}

#[test]
fn test_set_irq() {
    let bios = MockBios::default();
    let backend = detect(&bios).unwrap();

    backend.set_irq_hw_int(BdfAddress::new(1, 2, 3), 1, 11).unwrap();
    assert_eq!(*bios.irq_assignments.lock().unwrap(), [(0x0113, 0x0B01)]);
}

#[test]
fn test_far_pointer_rebase() {
    let bios = MockBios::default();
    let backend = detect(&bios).unwrap();
    let entry: FarPointer = backend.entry();
    let (offset, selector) = (entry.offset, entry.selector);
    assert_eq!(offset, 0xC00F_E000);
    assert_eq!(selector, 0x08);
}

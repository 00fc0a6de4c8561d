use num_enum::FromPrimitive;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PciError {
    /// No backend is installed, or the installed one lacks the operation.
    #[error("PCI access is not configured")]
    NotConfigured,
    #[error("No PCI access mechanism found")]
    NotFound,
    #[error("Unsupported PCI topology")]
    NotSupported,
    #[error("A PCI access mechanism is already installed")]
    AlreadyConfigured,
    #[error("Invalid configuration register {0:#x}")]
    InvalidRegister(u32),
    #[error("Location is outside of the configuration aperture")]
    OutOfAperture,
    #[error("Unsupported header type {0:#x}")]
    InvalidHeader(u8),
    #[error("IRQ routing buffer too small, {required} entries needed")]
    RoutingBufferTooSmall { required: usize },
    #[error("PCI BIOS call failed: {0:?}")]
    Bios(BiosStatus),
}

pub type PciResult<T> = Result<T, PciError>;

// Kernel-wide status codes.
const ERR_NOT_FOUND: i32 = -2;
const ERR_ALREADY_STARTED: i32 = -6;
const ERR_NOT_VALID: i32 = -7;
const ERR_INVALID_ARGS: i32 = -8;
const ERR_NOT_SUPPORTED: i32 = -24;
const ERR_OUT_OF_RANGE: i32 = -37;
const ERR_NOT_CONFIGURED: i32 = -38;

impl PciError {
    #[must_use]
    /// Integer status for C-style callers.
    ///
    /// Kernel errors are negative, PCI BIOS failures keep their raw
    /// (positive) status byte.
    pub const fn status_code(self) -> i32 {
        match self {
            Self::NotConfigured => ERR_NOT_CONFIGURED,
            Self::NotFound => ERR_NOT_FOUND,
            Self::NotSupported => ERR_NOT_SUPPORTED,
            Self::AlreadyConfigured => ERR_ALREADY_STARTED,
            Self::InvalidRegister(_) => ERR_INVALID_ARGS,
            Self::OutOfAperture => ERR_OUT_OF_RANGE,
            Self::InvalidHeader(_) => ERR_NOT_VALID,
            Self::RoutingBufferTooSmall { .. } => BiosStatus::BufferTooSmall.code() as i32,
            Self::Bios(status) => status.code() as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
/// Status byte returned in AH by PCI BIOS functions.
pub enum BiosStatus {
    Successful = 0x00,
    FuncNotSupported = 0x81,
    BadVendorId = 0x83,
    DeviceNotFound = 0x86,
    BadRegisterNumber = 0x87,
    SetFailed = 0x88,
    BufferTooSmall = 0x89,
    #[num_enum(catch_all)]
    Other(u8),
}

impl BiosStatus {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Successful => 0x00,
            Self::FuncNotSupported => 0x81,
            Self::BadVendorId => 0x83,
            Self::DeviceNotFound => 0x86,
            Self::BadRegisterNumber => 0x87,
            Self::SetFailed => 0x88,
            Self::BufferTooSmall => 0x89,
            Self::Other(code) => code,
        }
    }
}

//! Typed I/O ports.
//!
//! The access marker of a port is checked at compile time, so that a
//! write-only register such as PCI `CONFIG_ADDRESS` cannot be read by mistake.
use core::marker::PhantomData;

trait Sealed {}
#[allow(private_bounds)] // That's the whole point :)
pub trait Access: Sealed {}

pub trait ReadAccess: Access {}
pub trait WriteAccess: Access {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOnly;
impl Sealed for WriteOnly {}
impl Access for WriteOnly {}
impl WriteAccess for WriteOnly {}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWrite;
impl Sealed for ReadWrite {}
impl Access for ReadWrite {}
impl ReadAccess for ReadWrite {}
impl WriteAccess for ReadWrite {}

#[allow(private_bounds)]
/// A marker trait for types which can be transferred through a port.
pub trait PortAccessible: Sealed + Copy {
    #[must_use]
    unsafe fn read_from_port(port: u16) -> Self;
    unsafe fn write_to_port(port: u16, value: Self);
}

macro_rules! impl_port_accessible {
    ($t:ty, $reg:tt) => {
        impl Sealed for $t {}
        impl PortAccessible for $t {
            #[inline]
            unsafe fn read_from_port(port: u16) -> Self {
                let value: $t;
                unsafe {
                    core::arch::asm!(
                        concat!("in ", $reg, ", dx"),
                        out($reg) value,
                        in("dx") port,
                        options(nomem, nostack, preserves_flags)
                    );
                }
                value
            }

            #[inline]
            unsafe fn write_to_port(port: u16, value: Self) {
                unsafe {
                    core::arch::asm!(
                        concat!("out dx, ", $reg),
                        in("dx") port,
                        in($reg) value,
                        options(nomem, nostack, preserves_flags)
                    );
                }
            }
        }
    };
}

impl_port_accessible!(u8, "al");
impl_port_accessible!(u16, "ax");
impl_port_accessible!(u32, "eax");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port<T: PortAccessible, A: Access> {
    port: u16,
    phantom: PhantomData<(T, A)>,
}

impl<T: PortAccessible, A: Access> Port<T, A> {
    #[must_use]
    #[inline]
    pub const fn new(port: u16) -> Self {
        Self {
            port,
            phantom: PhantomData,
        }
    }
}

impl<T: PortAccessible, A: ReadAccess> Port<T, A> {
    #[must_use]
    #[inline]
    /// # Safety
    ///
    /// Reading a port can have side effects on the device behind it.
    pub unsafe fn read(&self) -> T {
        unsafe { T::read_from_port(self.port) }
    }
}

impl<T: PortAccessible, A: WriteAccess> Port<T, A> {
    #[inline]
    /// # Safety
    ///
    /// Writing a port can have side effects on the device behind it.
    pub unsafe fn write(&self, value: T) {
        unsafe { T::write_to_port(self.port, value) }
    }
}

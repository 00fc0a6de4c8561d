//! Locks related utilities.
//!
//! ## Modules
//!
//! - `ticket` : Provides an implementation of the ticket lock.
//!
//! ## Back-off Strategy
//!
//! Locks are generic over a `BackOff` strategy, called every time a
//! thread fails to acquire the lock. The default strategy, `Spin`,
//! hints the CPU that we are in a busy-wait loop.

pub mod ticket;

/// A trait that defines a back-off strategy for locks.
pub trait BackOff {
    /// Performs the back-off operation.
    fn back_off();
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A back-off strategy that uses a spin-wait loop.
pub struct Spin;

impl BackOff for Spin {
    #[inline]
    fn back_off() {
        core::hint::spin_loop();
    }
}

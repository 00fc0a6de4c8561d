//! Fallbacks for architectures without port I/O nor BIOS services.

pub mod instructions {
    #[inline]
    pub fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // TODO: Mask interrupts through DAIF once an aarch64 port exists.
        f()
    }
}

//! A cell that is written at most once.
//!
//! Unlike a lock, `Once` never hands out mutable access: the value is
//! published by a single writer and only shared references exist afterwards.
//! This is the shape of boot-time singletons, which are chosen once and then
//! read from any context without synchronization.
//!
//! ```rust
//! # use hyperdrive::once::Once;
//! #
//! static ONCE: Once<u8> = Once::uninit();
//! assert!(ONCE.get().is_none());
//!
//! assert!(ONCE.set(42).is_ok());
//! assert_eq!(ONCE.set(7), Err(7));
//! assert_eq!(ONCE.get(), Some(&42));
//! ```
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const INITIALIZED: u8 = 2;

pub struct Once<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// Safety:
// Only shared references to the value are handed out, once it is fully written.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: Send> Send for Once<T> {}
unsafe impl<T: Send + Sync> Sync for Once<T> {}

impl<T> Default for Once<T> {
    fn default() -> Self {
        Self::uninit()
    }
}

impl<T> Once<T> {
    #[must_use]
    pub const fn uninit() -> Self {
        Self {
            state: AtomicU8::new(UNINITIALIZED),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Stores `value` if the cell is still empty.
    ///
    /// If the cell was already written (or is being written), the value is
    /// handed back to the caller untouched.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self
            .state
            .compare_exchange(
                UNINITIALIZED,
                INITIALIZING,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return Err(value);
        }

        // Safety:
        // Winning the exchange makes us the only writer.
        unsafe { (*self.value.get()).write(value) };
        self.state.store(INITIALIZED, Ordering::Release);

        Ok(())
    }

    /// Initializes the value with `initializer` if the cell is still empty.
    pub fn call_once<F: FnOnce() -> T>(&self, initializer: F) {
        if self
            .state
            .compare_exchange(
                UNINITIALIZED,
                INITIALIZING,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            let value = initializer();
            // Safety:
            // Winning the exchange makes us the only writer.
            unsafe { (*self.value.get()).write(value) };
            self.state.store(INITIALIZED, Ordering::Release);
        }
    }

    #[must_use]
    /// Returns the value if it has been published.
    ///
    /// A reader racing with the writer waits for the write to complete
    /// rather than observing an empty cell.
    pub fn get(&self) -> Option<&T> {
        loop {
            match self.state.load(Ordering::Acquire) {
                // Safety: The value is fully written and never mutated again.
                INITIALIZED => return Some(unsafe { (*self.value.get()).assume_init_ref() }),
                INITIALIZING => core::hint::spin_loop(),
                _ => return None,
            }
        }
    }

    #[must_use]
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == INITIALIZED
    }
}

impl<T> Drop for Once<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == INITIALIZED {
            // Safety: The value is initialized and we have exclusive access.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

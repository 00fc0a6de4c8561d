//! Ticket lock implementation.
//!
//! Threads take a ticket and wait until the lock serves their number,
//! so the lock is handed over in FIFO order and nobody starves.
//!
//! The lock does not touch the interrupt state. Code that may also run in
//! interrupt context must mask interrupts around the critical section
//! (see `beskar_hal::instructions::without_interrupts`), otherwise an
//! interrupt handler spinning on a lock held by the thread it interrupted
//! never makes progress.
//!
//! ```rust
//! # use hyperdrive::locks::ticket::TicketLock;
//! #
//! let lock = TicketLock::<u8>::new(0);
//!
//! let res = lock.with_locked(|value| {
//!     *value = 42;
//!     *value
//! });
//! assert_eq!(res, 42);
//! assert!(!lock.is_locked());
//! ```
//!
//! Rustc requires either `T` or the back-off strategy to be specified:
//!
//! ```rust,compile_fail
//! # use hyperdrive::locks::ticket::TicketLock;
//! let lock = TicketLock::new(0);
//! ```

use super::{BackOff, Spin};
use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicU32, Ordering},
};

/// A fair spinlock.
pub struct TicketLock<T, B: BackOff = Spin> {
    /// Next ticket to hand out.
    next_ticket: AtomicU32,
    /// Ticket currently allowed in the critical section.
    now_serving: AtomicU32,
    data: UnsafeCell<T>,
    _back_off: PhantomData<B>,
}

// Safety:
// Access to `data` only happens through a guard, and there is at most one guard.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: Send, B: BackOff> Send for TicketLock<T, B> {}
unsafe impl<T: Send, B: BackOff> Sync for TicketLock<T, B> {}

impl<T, B: BackOff> TicketLock<T, B> {
    #[must_use]
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
            data: UnsafeCell::new(data),
            _back_off: PhantomData,
        }
    }

    #[must_use]
    /// Spins until the lock is ours and returns a guard.
    ///
    /// For single operations, prefer `with_locked`.
    pub fn lock(&self) -> TicketGuard<'_, T, B> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        while self.now_serving.load(Ordering::Acquire) != ticket {
            B::back_off();
        }

        TicketGuard { lock: self }
    }

    #[must_use]
    /// Takes the lock only if nobody holds it nor waits for it.
    pub fn try_lock(&self) -> Option<TicketGuard<'_, T, B>> {
        let serving = self.now_serving.load(Ordering::Relaxed);
        self.next_ticket
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .ok()
            .map(|_| TicketGuard { lock: self })
    }

    #[inline]
    /// Runs `f` with exclusive access to the protected data.
    pub fn with_locked<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    #[inline]
    /// Runs `f` with exclusive access to the protected data if the lock is free.
    pub fn try_with_locked<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> Option<R> {
        self.try_lock().map(|mut guard| f(&mut guard))
    }

    #[must_use]
    #[inline]
    /// Returns whether someone holds the lock.
    ///
    /// The answer may already be stale when it is returned.
    pub fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Relaxed) != self.now_serving.load(Ordering::Relaxed)
    }

    #[inline]
    /// # Safety
    ///
    /// The caller must be the owner of the lock.
    unsafe fn unlock(&self) {
        self.now_serving.fetch_add(1, Ordering::Release);
    }
}

/// RAII guard for the ticket lock.
pub struct TicketGuard<'l, T, B: BackOff> {
    lock: &'l TicketLock<T, B>,
}

impl<T, B: BackOff> Drop for TicketGuard<'_, T, B> {
    #[inline]
    fn drop(&mut self) {
        // Safety: If the guard exists, we have the lock.
        unsafe { self.lock.unlock() };
    }
}

impl<T, B: BackOff> Deref for TicketGuard<'_, T, B> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // Safety: The guard grants exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, B: BackOff> DerefMut for TicketGuard<'_, T, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Safety: The guard grants exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

/// Interrupt flag in EFLAGS/RFLAGS.
const IF: usize = 1 << 9;

#[inline]
pub fn int_disable() {
    unsafe {
        core::arch::asm!("cli", options(nomem, preserves_flags, nostack));
    }
}

#[inline]
pub fn int_enable() {
    unsafe {
        core::arch::asm!("sti", options(nomem, preserves_flags, nostack));
    }
}

#[must_use]
#[inline]
/// Reads the flags register.
pub fn flags() -> usize {
    let flags: usize;
    unsafe {
        #[cfg(target_arch = "x86_64")]
        core::arch::asm!("pushfq", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        #[cfg(target_arch = "x86")]
        core::arch::asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
    }
    flags
}

#[must_use]
#[inline]
pub fn interrupts_enabled() -> bool {
    flags() & IF != 0
}

/// Runs `f` with interrupts masked on the current core, then restores
/// the interrupt state that was in effect before the call.
///
/// Hosted builds (unit tests) run in user mode where `cli` faults, so there
/// `f` is simply called.
#[inline]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    #[cfg(target_os = "none")]
    {
        if interrupts_enabled() {
            int_disable();
            let result = f();
            int_enable();
            result
        } else {
            // Interrupts are already disabled, just call the function
            f()
        }
    }
    #[cfg(not(target_os = "none"))]
    {
        f()
    }
}

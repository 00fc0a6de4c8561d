//! BIOS32 far calls.
//!
//! The BIOS32 service directory and the services it locates are entered with
//! a far call through a 48-bit pointer (32-bit offset, 16-bit selector) and
//! communicate exclusively through general purpose registers and the carry
//! flag. This module reduces that convention to a single primitive that
//! takes a register block and returns the register block left by the BIOS.
//!
//! The call itself only exists on 32-bit x86: BIOS32 code is 32-bit
//! protected mode code and cannot be entered from long mode. The register
//! types are available on every target so that the logic built on top of
//! them can be exercised anywhere.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
/// Target of a far call.
pub struct FarPointer {
    pub offset: u32,
    pub selector: u16,
}

crate::static_assert!(size_of::<FarPointer>() == 6);

impl FarPointer {
    #[must_use]
    #[inline]
    pub const fn new(offset: u32, selector: u16) -> Self {
        Self { offset, selector }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
/// Register block exchanged with the BIOS.
///
/// Registers are native-width so that `esi`/`edi` can carry pointers.
pub struct Registers {
    pub eax: usize,
    pub ebx: usize,
    pub ecx: usize,
    pub edx: usize,
    pub esi: usize,
    pub edi: usize,
    /// Flags as left by the BIOS. Only meaningful on output.
    pub eflags: usize,
}

impl Registers {
    /// Carry flag in EFLAGS.
    pub const CARRY: usize = 1;

    #[must_use]
    #[inline]
    pub const fn carry(&self) -> bool {
        self.eflags & Self::CARRY != 0
    }

    #[must_use]
    #[inline]
    #[expect(clippy::cast_possible_truncation, reason = "Register slicing")]
    pub const fn al(&self) -> u8 {
        self.eax as u8
    }

    #[must_use]
    #[inline]
    #[expect(clippy::cast_possible_truncation, reason = "Register slicing")]
    pub const fn ah(&self) -> u8 {
        (self.eax >> 8) as u8
    }
}

#[cfg(target_arch = "x86")]
/// Far calls `entry` with the given registers.
///
/// # Safety
///
/// `entry` must point to BIOS32 code mapped in the current address space and
/// reachable through `entry.selector`. Pointers passed in registers must
/// stay valid for the duration of the call, and the BIOS is not reentrant:
/// callers must serialize calls.
pub unsafe fn far_call(entry: &FarPointer, registers: &mut Registers) {
    // `esi` and `ebp` cannot be used as operands, they are saved by hand.
    // The register block pointer is kept on the stack across the call.
    unsafe {
        core::arch::asm!(
            "push ebp",
            "push esi",
            "push eax",
            "movzx ebx, word ptr [ecx + 4]",
            "push ebx",
            "push dword ptr [ecx]",
            "mov ebx, [eax + 4]",
            "mov ecx, [eax + 8]",
            "mov edx, [eax + 12]",
            "mov esi, [eax + 16]",
            "mov edi, [eax + 20]",
            "mov eax, [eax]",
            "call fword ptr [esp]",
            "pushfd",
            // Swap the returned eax with the saved register block pointer.
            "xchg eax, [esp + 12]",
            "mov [eax + 4], ebx",
            "mov [eax + 8], ecx",
            "mov [eax + 12], edx",
            "mov [eax + 16], esi",
            "mov [eax + 20], edi",
            "pop ecx",
            "mov [eax + 24], ecx",
            "add esp, 8",
            "pop ecx",
            "mov [eax], ecx",
            "pop esi",
            "pop ebp",
            inout("eax") core::ptr::from_mut(registers) => _,
            inout("ecx") core::ptr::from_ref(entry) => _,
            out("ebx") _,
            out("edx") _,
            out("edi") _,
        );
    }
}

//! Hardware abstraction layer.
//!
//! Everything that needs inline assembly lives here, behind small typed
//! wrappers, so that the drivers on top of it stay architecture neutral.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_safety_doc,
    clippy::doc_markdown
)]

pub mod bios32;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use x86::*;

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
mod generic;
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub use generic::*;

#[macro_export]
macro_rules! static_assert {
    ($condition:expr $(, $($arg:tt)+)?) => {
        const _: () = assert!($condition $(, $($arg)+)?);
    };
}

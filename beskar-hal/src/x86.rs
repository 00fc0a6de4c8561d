//! x86 specific code, shared by the 32-bit and 64-bit targets.
pub mod instructions;
pub mod port;

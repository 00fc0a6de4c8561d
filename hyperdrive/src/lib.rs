//! Hyperdrive is the synchronization toolbox of the kernel.
//!
//! It only contains what configuration-space access needs: a fair spinlock
//! to serialize hardware transactions and a write-once cell to publish
//! boot-time singletons.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]

pub mod locks;
pub mod once;

//! Kernel logging.
//!
//! Drivers log through the `debug!`, `info!`, `warn!` and `error!` macros.
//! Where the messages end up (serial line, screen, ...) is decided once by
//! the kernel, which installs a `LogSink` early during boot. Messages logged
//! before a sink is installed are dropped.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use hyperdrive::once::Once;

static SINK: Once<&'static dyn LogSink> = Once::uninit();
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Debug as u8);

/// Destination of log messages.
pub trait LogSink: Sync {
    fn write(&self, severity: Severity, args: fmt::Arguments);
}

/// Installs the kernel log sink.
///
/// Only the first call has an effect, further sinks are handed back.
pub fn set_sink(sink: &'static dyn LogSink) -> Result<(), &'static dyn LogSink> {
    SINK.set(sink)
}

#[inline]
/// Drops every message less severe than `severity`.
pub fn set_min_severity(severity: Severity) {
    MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
}

pub fn log(severity: Severity, args: fmt::Arguments) {
    if (severity as u8) < MIN_SEVERITY.load(Ordering::Relaxed) {
        return;
    }
    if let Some(sink) = SINK.get() {
        sink.write(severity, args);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warn => "WARN ",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[macro_export]
macro_rules! debug {
    ($fmt:expr) => {
        $crate::log($crate::Severity::Debug, format_args!(concat!($fmt, "\n")));
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::log($crate::Severity::Debug, format_args!(concat!($fmt, "\n"), $($arg)*));
    };
}

#[macro_export]
macro_rules! info {
    ($fmt:expr) => {
        $crate::log($crate::Severity::Info, format_args!(concat!($fmt, "\n")));
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::log($crate::Severity::Info, format_args!(concat!($fmt, "\n"), $($arg)*));
    };
}

#[macro_export]
macro_rules! warn {
    ($fmt:expr) => {
        $crate::log($crate::Severity::Warn, format_args!(concat!($fmt, "\n")));
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::log($crate::Severity::Warn, format_args!(concat!($fmt, "\n"), $($arg)*));
    };
}

#[macro_export]
macro_rules! error {
    ($fmt:expr) => {
        $crate::log($crate::Severity::Error, format_args!(concat!($fmt, "\n")));
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::log($crate::Severity::Error, format_args!(concat!($fmt, "\n"), $($arg)*));
    };
}

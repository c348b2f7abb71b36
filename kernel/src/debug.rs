//! Debug output and logging
//!
//! Leveled kernel logging over the machine's console byte sink. The
//! threshold is fixed at compile time by the `log-*` cargo features
//! (INFO when none is selected), so suppressed levels cost nothing at
//! runtime.
//!
//! `klog!` is the one tagged entry point; `kprint!`/`kprintln!` emit raw
//! output. The fault path stays silent by policy; logging here is for
//! bring-up and teardown diagnostics.

use core::fmt;

use crate::machine;

/// Message severity, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Tag prefixed to each tagged message, padded to a fixed width so the
    /// message column lines up across levels
    pub const fn tag(self) -> &'static str {
        match self {
            LogLevel::Error => "[error]",
            LogLevel::Warn => "[warn] ",
            LogLevel::Info => "[info] ",
            LogLevel::Debug => "[debug]",
            LogLevel::Trace => "[trace]",
        }
    }
}

/// Compile-time logging threshold.
///
/// When several `log-*` features are enabled the most verbose one wins.
pub const LOG_THRESHOLD: LogLevel = if cfg!(feature = "log-trace") {
    LogLevel::Trace
} else if cfg!(feature = "log-debug") {
    LogLevel::Debug
} else if cfg!(feature = "log-info") {
    LogLevel::Info
} else if cfg!(feature = "log-warn") {
    LogLevel::Warn
} else if cfg!(feature = "log-error") {
    LogLevel::Error
} else {
    LogLevel::Info
};

/// Check whether messages at `level` clear the compile-time threshold
#[inline(always)]
pub const fn enabled(level: LogLevel) -> bool {
    level as u8 <= LOG_THRESHOLD as u8
}

/// Hand formatted output to the console; the print macros funnel through
/// here so the sink type stays private
pub fn emit(args: fmt::Arguments<'_>) {
    use fmt::Write;
    let _ = DebugSink.write_fmt(args);
}

/// Adapter driving the machine console from `core::fmt`
struct DebugSink;

impl fmt::Write for DebugSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().for_each(put_byte);
        Ok(())
    }
}

/// Push one byte out, expanding newlines to CR+LF; a bare line feed makes
/// serial terminals stairstep the output
fn put_byte(byte: u8) {
    if byte == b'\n' {
        machine::console_put(b'\r');
    }
    machine::console_put(byte);
}

/// Print to the console (unconditional, untagged)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ($crate::debug::emit(format_args!($($arg)*)));
}

/// Print to the console with a trailing newline
#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ($crate::kprint!("{}\n", format_args!($($arg)*)));
}

/// Log a tagged message at a severity level: `klog!(Info, "fmt", args...)`.
///
/// Levels below the compile-time threshold compile down to nothing.
#[macro_export]
macro_rules! klog {
    ($level:ident, $($arg:tt)*) => ({
        let level = $crate::debug::LogLevel::$level;
        if $crate::debug::enabled(level) {
            $crate::kprintln!("{} {}", level.tag(), format_args!($($arg)*));
        }
    });
}

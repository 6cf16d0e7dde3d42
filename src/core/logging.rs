//! Logging abstraction
//!
//! Provides unified logging macros that work across different targets:
//! - Every target: the line goes to the installed [`Logger`](crate::core::log_router::Logger)
//! - `defmt` feature: the same line is mirrored to defmt
//! - Host tests: the line is also printed with `println!`
//!
//! The macros take `core::fmt` syntax. Formatting happens once per line, and
//! not at all when nothing would consume it.

use crate::core::log_buffer::{LogLevel, LogMessage};
use crate::core::log_router::{self, Logger};
use core::fmt;

/// Entry point used by the `log_*!` macros
pub fn dispatch(level: LogLevel, args: fmt::Arguments<'_>) {
    let logger = log_router::installed();
    let wanted = logger.is_some_and(|l| l.accepts(level));
    if !wanted && !cfg!(any(test, feature = "defmt")) {
        return;
    }

    let message = LogMessage::format_stamped(level, logger.and_then(Logger::timestamp_ms), args);

    #[cfg(test)]
    println!("{}", message.as_str());

    #[cfg(feature = "defmt")]
    mirror_to_defmt(level, message.as_str());

    if let Some(logger) = logger.filter(|_| wanted) {
        logger.publish_line(level, message.as_str());
    }
}

#[cfg(feature = "defmt")]
fn mirror_to_defmt(level: LogLevel, line: &str) {
    match level {
        LogLevel::Trace => defmt::trace!("{=str}", line),
        LogLevel::Debug => defmt::debug!("{=str}", line),
        LogLevel::Info => defmt::info!("{=str}", line),
        LogLevel::Warn => defmt::warn!("{=str}", line),
        LogLevel::Error => defmt::error!("{=str}", line),
        LogLevel::Off => {}
    }
}

/// Log informational message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::core::logging::dispatch(
            $crate::core::log_buffer::LogLevel::Info,
            format_args!($($arg)*),
        )
    };
}

/// Log warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::core::logging::dispatch(
            $crate::core::log_buffer::LogLevel::Warn,
            format_args!($($arg)*),
        )
    };
}

/// Log error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::core::logging::dispatch(
            $crate::core::log_buffer::LogLevel::Error,
            format_args!($($arg)*),
        )
    };
}

/// Log debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::core::logging::dispatch(
            $crate::core::log_buffer::LogLevel::Debug,
            format_args!($($arg)*),
        )
    };
}

/// Log trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::core::logging::dispatch(
            $crate::core::log_buffer::LogLevel::Trace,
            format_args!($($arg)*),
        )
    };
}

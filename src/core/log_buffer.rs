//! Log records and the in-memory log sink
//!
//! Provides the level/record types shared by the logger and its sinks, plus a
//! fixed-capacity history of recent lines. Uses heapless `HistoryBuf` for
//! no-allocation storage.
//!
//! ## Features
//!
//! - Lines formatted once into a fixed 256-byte buffer, truncated on a char boundary
//! - Automatic oldest message eviction when the history is full
//! - Overflow tracking for diagnostics
//! - Oldest-first iteration order

use crate::config::LOG_MAX_MESSAGE;
use crate::core::log_router::LogSink;
use crate::core::traits::{CriticalState, SharedState};
use core::fmt::{self, Write};
use heapless::{HistoryBuf, String, Vec};

/// History capacity in number of messages
pub const LOG_BUFFER_SIZE: usize = 16;

/// Log level with ordering: Trace < Debug < Info < Warn < Error < Off
///
/// `Off` is only meaningful as a subscriber threshold; it mutes the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl LogLevel {
    /// Line prefix for this level
    pub const fn prefix(self) -> &'static str {
        match self {
            LogLevel::Trace => "[TRACE] ",
            LogLevel::Debug => "[DEBUG] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Error => "[ERROR] ",
            LogLevel::Off => "",
        }
    }
}

/// Formatted log line with its level
#[derive(Clone)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String<LOG_MAX_MESSAGE>,
}

impl LogMessage {
    /// Create a new log message
    pub fn new(level: LogLevel, message: String<LOG_MAX_MESSAGE>) -> Self {
        Self { level, message }
    }

    /// Format `args` behind the level prefix, truncating to the line limit
    pub fn format(level: LogLevel, args: fmt::Arguments<'_>) -> Self {
        Self::format_stamped(level, None, args)
    }

    /// Like [`format`](Self::format), with `[<ms>] ` in front when
    /// `uptime_ms` is given
    pub fn format_stamped(level: LogLevel, uptime_ms: Option<u64>, args: fmt::Arguments<'_>) -> Self {
        let mut message = String::new();
        let mut out = Truncating(&mut message);
        // Truncating never reports an error; a failing Display impl just
        // ends the line early.
        if let Some(ms) = uptime_ms {
            let _ = write!(out, "[{}] ", ms);
        }
        let _ = out.write_str(level.prefix());
        let _ = out.write_fmt(args);
        Self { level, message }
    }

    pub fn as_str(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Debug for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogMessage").field(&self.message.as_str()).finish()
    }
}

/// `fmt::Write` adapter that silently stops at capacity
struct Truncating<'a, const N: usize>(&'a mut String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Ring buffer of recent log lines
///
/// Stores up to LOG_BUFFER_SIZE messages. When full, the oldest message
/// is automatically evicted to make room for new messages.
pub struct RingBufferSink {
    buffer: HistoryBuf<LogMessage, LOG_BUFFER_SIZE>,
    overflow_count: u32,
}

impl RingBufferSink {
    /// Create a new empty ring buffer sink
    pub const fn new() -> Self {
        Self {
            buffer: HistoryBuf::new(),
            overflow_count: 0,
        }
    }

    /// Push a message to the buffer
    ///
    /// If the buffer is full, the oldest message is evicted and
    /// overflow_count is incremented.
    pub fn push(&mut self, msg: LogMessage) {
        if self.buffer.len() == LOG_BUFFER_SIZE {
            self.overflow_count = self.overflow_count.saturating_add(1);
        }
        self.buffer.write(msg);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len() == 0
    }

    /// Return the number of messages lost due to buffer overflow
    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }

    /// Iterate over messages in oldest-first order
    pub fn iter(&self) -> impl Iterator<Item = &LogMessage> {
        self.buffer.oldest_ordered()
    }

    /// Drain all messages from the buffer, returning them in oldest-first order
    pub fn drain(&mut self) -> Vec<LogMessage, LOG_BUFFER_SIZE> {
        let mut result = Vec::new();
        for msg in self.buffer.oldest_ordered() {
            let _ = result.push(msg.clone());
        }
        self.buffer.clear();
        result
    }

    /// Clear all messages from the buffer
    ///
    /// Does not reset overflow_count.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for RingBufferSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Logger subscriber that keeps recent lines in RAM
///
/// Useful as a post-mortem buffer on target and as a capture sink in tests.
pub struct MemoryLogSink {
    inner: CriticalState<RingBufferSink>,
}

impl MemoryLogSink {
    pub const fn new() -> Self {
        Self {
            inner: CriticalState::new(RingBufferSink::new()),
        }
    }

    /// Take every buffered line, oldest first
    pub fn drain(&self) -> Vec<LogMessage, LOG_BUFFER_SIZE> {
        self.inner.with_mut(|sink| sink.drain())
    }

    /// Run `f` against the buffered lines without removing them
    pub fn peek<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RingBufferSink) -> R,
    {
        self.inner.with(f)
    }

    pub fn len(&self) -> usize {
        self.inner.with(|sink| sink.len())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.with(|sink| sink.is_empty())
    }

    pub fn overflow_count(&self) -> u32 {
        self.inner.with(|sink| sink.overflow_count())
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemoryLogSink {
    fn write(&self, level: LogLevel, line: &str) {
        let mut message = String::new();
        let _ = Truncating(&mut message).write_str(line);
        self.inner
            .with_mut(|sink| sink.push(LogMessage::new(level, message)));
    }
}

//! Log Router
//!
//! Publish/subscribe fan-out for log lines. A line is formatted once and then
//! handed to every subscribed [`LogSink`] whose threshold it meets:
//!
//! ```text
//! log_info!(..) ─► dispatch ─► Logger ─┬─► UartLogSink   (min Info)
//!                                      ├─► MemoryLogSink (min Debug)
//!                                      └─► ... up to 4 subscribers
//! ```
//!
//! The subscriber table is snapshotted inside a critical section and sinks run
//! outside it, so a sink may itself take short critical sections.
//!
//! ## Usage
//!
//! ```ignore
//! static LOGGER: Logger = Logger::new();
//! static MEMORY: MemoryLogSink = MemoryLogSink::new();
//!
//! LOGGER.install()?;
//! LOGGER.subscribe(&MEMORY, LogLevel::Debug)?;
//! log_info!("boot complete");
//! ```

use crate::config::LOG_MAX_SUBSCRIBERS;
use crate::core::log_buffer::{LogLevel, LogMessage};
use crate::core::traits::{CriticalState, SharedState};
use core::fmt;

/// Destination for formatted log lines
///
/// Sinks are called from whatever context logged, so `write` must be fast and
/// must never block.
pub trait LogSink: Sync {
    fn write(&self, level: LogLevel, line: &str);
}

/// Handle returned by [`Logger::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriberId(u8);

/// Logger errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogError {
    /// All subscriber slots are taken
    NoFreeSlot,
    /// The id does not name a live subscription
    UnknownSubscriber,
    /// A process-wide logger is already installed
    AlreadyInstalled,
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::NoFreeSlot => write!(f, "no free subscriber slot"),
            LogError::UnknownSubscriber => write!(f, "unknown subscriber"),
            LogError::AlreadyInstalled => write!(f, "logger already installed"),
        }
    }
}

#[derive(Clone, Copy)]
struct Subscriber {
    sink: &'static dyn LogSink,
    min_level: LogLevel,
}

impl Subscriber {
    fn accepts(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.min_level
    }
}

type Table = [Option<Subscriber>; LOG_MAX_SUBSCRIBERS];

/// Uptime source for line timestamps (ms)
pub type LogClock = fn() -> u64;

/// Log router that dispatches messages to subscribed sinks
pub struct Logger {
    subscribers: CriticalState<Table>,
    clock: CriticalState<Option<LogClock>>,
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            subscribers: CriticalState::new([None; LOG_MAX_SUBSCRIBERS]),
            clock: CriticalState::new(None),
        }
    }

    /// Prefix every line formatted from now on with `clock()`; `None` stops it
    pub fn set_clock(&self, clock: Option<LogClock>) {
        self.clock.set(clock);
    }

    /// Timestamp for a line formatted now, if a clock is set
    pub fn timestamp_ms(&self) -> Option<u64> {
        self.clock.get().map(|clock| clock())
    }

    /// Register `sink` for every line at or above `min_level`
    pub fn subscribe(
        &self,
        sink: &'static dyn LogSink,
        min_level: LogLevel,
    ) -> Result<SubscriberId, LogError> {
        self.subscribers.with_mut(|table| {
            let index = table
                .iter()
                .position(Option::is_none)
                .ok_or(LogError::NoFreeSlot)?;
            table[index] = Some(Subscriber { sink, min_level });
            Ok(SubscriberId(index as u8))
        })
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> Result<(), LogError> {
        self.subscribers.with_mut(|table| {
            table
                .get_mut(usize::from(id.0))
                .and_then(Option::take)
                .map(|_| ())
                .ok_or(LogError::UnknownSubscriber)
        })
    }

    /// Change the threshold of an existing subscription
    pub fn set_min_level(&self, id: SubscriberId, min_level: LogLevel) -> Result<(), LogError> {
        self.subscribers.with_mut(|table| {
            match table.get_mut(usize::from(id.0)).and_then(Option::as_mut) {
                Some(sub) => {
                    sub.min_level = min_level;
                    Ok(())
                }
                None => Err(LogError::UnknownSubscriber),
            }
        })
    }

    /// Whether any subscriber wants lines at `level`
    pub fn accepts(&self, level: LogLevel) -> bool {
        self.subscribers
            .with(|table| table.iter().flatten().any(|s| s.accepts(level)))
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.with(|table| table.iter().flatten().count())
    }

    /// Format and publish a line
    pub fn publish(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if !self.accepts(level) {
            return;
        }
        let message = LogMessage::format_stamped(level, self.timestamp_ms(), args);
        self.publish_line(level, message.as_str());
    }

    /// Publish an already formatted line
    pub fn publish_line(&self, level: LogLevel, line: &str) {
        let snapshot: Table = self.subscribers.get();
        for sub in snapshot.iter().flatten() {
            if sub.accepts(level) {
                sub.sink.write(level, line);
            }
        }
    }

    /// Make this logger the target of the `log_*!` macros
    ///
    /// Called once during boot.
    pub fn install(&'static self) -> Result<(), LogError> {
        INSTALLED.with_mut(|slot| match slot {
            Some(_) => Err(LogError::AlreadyInstalled),
            None => {
                *slot = Some(self);
                Ok(())
            }
        })
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

static INSTALLED: CriticalState<Option<&'static Logger>> = CriticalState::new(None);

/// The logger installed with [`Logger::install`], if any
pub fn installed() -> Option<&'static Logger> {
    INSTALLED.get()
}

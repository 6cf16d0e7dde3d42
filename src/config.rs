//! Firmware configuration
//!
//! Compile-time defaults for every tunable in the application, grouped per
//! subsystem. Boards override fields before boot; [`AppConfig::validate`]
//! rejects combinations the runtime cannot honour.
//!
//! # Defaults
//!
//! | Setting                      | Default        |
//! |------------------------------|----------------|
//! | button sample period         | 50 ms          |
//! | button debounce              | 20 ms          |
//! | PULSE / SHORT / LONG         | 200 / 1000 / 2000 ms |
//! | LED idle timeout             | 500 ms         |
//! | UI LED hold                  | 1000 ms        |
//! | mailbox lock bound           | 100 ms         |
//! | mailbox overflow             | evict oldest   |
//! | UART stream / DMA chunk      | 1024 / 256 B   |

use crate::core::log_buffer::LogLevel;
use core::fmt;

/// Depth of each LED active object's mailbox.
pub const LED_MAILBOX_DEPTH: usize = 10;

/// Pooled LED request blocks owned by the UI.
pub const UI_POOL_BLOCKS: usize = 10;

/// Slots per priority level in the UI mailbox (power of two).
pub const UI_MAILBOX_DEPTH: usize = 8;

/// UART stream buffer capacity in bytes.
pub const UART_STREAM_CAPACITY: usize = 1024;

/// Largest single DMA transfer in bytes.
pub const UART_DMA_CHUNK: usize = 256;

/// Maximum formatted log line length in bytes.
pub const LOG_MAX_MESSAGE: usize = 256;

/// Maximum number of logger subscribers.
pub const LOG_MAX_SUBSCRIBERS: usize = 4;

const _: () = assert!(UART_DMA_CHUNK <= UART_STREAM_CAPACITY);
const _: () = assert!(UI_MAILBOX_DEPTH.is_power_of_two());

/// What a full mailbox level does with a new message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowPolicy {
    /// Drop the oldest entry of that level and accept the new one
    #[default]
    EvictOldest,
    /// Refuse the new message and hand it back to the sender
    Reject,
}

/// Priority mailbox settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxConfig {
    /// Upper bound on any single lock wait (ms)
    pub lock_timeout_ms: u32,
    pub overflow: OverflowPolicy,
}

impl MailboxConfig {
    pub const DEFAULT: Self = Self {
        lock_timeout_ms: 100,
        overflow: OverflowPolicy::EvictOldest,
    };
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Button sampling and classification thresholds (all in ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig {
    pub sample_period_ms: u32,
    /// Level must be stable this long before it counts
    pub debounce_ms: u32,
    /// Shortest press that is not noise
    pub pulse_ms: u32,
    pub short_ms: u32,
    pub long_ms: u32,
    /// Pressed reads as logic low (button to ground with pull-up)
    pub active_low: bool,
}

impl ButtonConfig {
    pub const DEFAULT: Self = Self {
        sample_period_ms: 50,
        debounce_ms: 20,
        pulse_ms: 200,
        short_ms: 1000,
        long_ms: 2000,
        active_low: true,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if !(self.pulse_ms < self.short_ms && self.short_ms < self.long_ms) {
            return Err(ConfigError::ThresholdOrder);
        }
        if self.debounce_ms > self.short_ms {
            return Err(ConfigError::DebounceTooLong);
        }
        Ok(())
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// LED active object settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedConfig {
    /// Serving task retires after this long without requests
    pub idle_timeout_ms: u32,
}

impl LedConfig {
    pub const DEFAULT: Self = Self {
        idle_timeout_ms: 500,
    };
}

impl Default for LedConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// UI active object settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiConfig {
    /// How long a lit LED stays on without a new event
    pub hold_ms: u32,
}

impl UiConfig {
    pub const DEFAULT: Self = Self { hold_ms: 1000 };
}

impl Default for UiConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Logger wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Lowest level forwarded to the UART sink
    pub uart_min_level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            uart_min_level: LogLevel::Info,
        }
    }
}

/// Whole-application configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub button: ButtonConfig,
    pub led: LedConfig,
    pub ui: UiConfig,
    pub mailbox: MailboxConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.button.validate()?;
        if self.led.idle_timeout_ms == 0 || self.ui.hold_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.mailbox.lock_timeout_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }
}

/// Configuration rejected by `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A period or timeout is zero
    ZeroPeriod,
    /// Thresholds are not strictly increasing (pulse < short < long)
    ThresholdOrder,
    /// Debounce window longer than the SHORT threshold
    DebounceTooLong,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPeriod => write!(f, "period or timeout must be non-zero"),
            ConfigError::ThresholdOrder => write!(f, "thresholds must satisfy pulse < short < long"),
            ConfigError::DebounceTooLong => write!(f, "debounce exceeds short threshold"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.button.pulse_ms, 200);
        assert_eq!(config.button.short_ms, 1000);
        assert_eq!(config.button.long_ms, 2000);
        assert_eq!(config.led.idle_timeout_ms, 500);
        assert_eq!(config.mailbox.lock_timeout_ms, 100);
        assert_eq!(config.mailbox.overflow, OverflowPolicy::EvictOldest);
        assert_eq!(config.log.uart_min_level, LogLevel::Info);
    }

    #[test]
    fn test_threshold_order_enforced() {
        let button = ButtonConfig {
            short_ms: 3000,
            ..ButtonConfig::default()
        };
        assert_eq!(button.validate(), Err(ConfigError::ThresholdOrder));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = AppConfig::default();
        config.button.sample_period_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeriod));

        let mut config = AppConfig::default();
        config.ui.hold_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn test_long_debounce_rejected() {
        let button = ButtonConfig {
            debounce_ms: 1500,
            ..ButtonConfig::default()
        };
        assert_eq!(button.validate(), Err(ConfigError::DebounceTooLong));
    }
}

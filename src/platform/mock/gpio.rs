//! Mock GPIO implementation for testing

use crate::platform::{
    error::{GpioError, PlatformError},
    traits::{GpioInterface, GpioMode},
    Result,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Line {
    level: AtomicBool,
    writes: AtomicU32,
    fail: AtomicBool,
}

/// Mock GPIO implementation
///
/// Tracks pin level and mode for test verification.
#[derive(Debug)]
pub struct MockGpio {
    line: Arc<Line>,
    mode: GpioMode,
}

/// Test-side view of a [`MockGpio`] line
#[derive(Debug, Clone)]
pub struct MockGpioProbe {
    line: Arc<Line>,
}

impl MockGpio {
    /// Create a new mock GPIO in output mode
    pub fn new_output() -> Self {
        Self {
            line: Arc::new(Line::default()),
            mode: GpioMode::OutputPushPull,
        }
    }

    /// Create a new mock GPIO in input mode with pull-up (idle level high)
    pub fn new_input_pull_up() -> Self {
        let gpio = Self {
            line: Arc::new(Line::default()),
            mode: GpioMode::InputPullUp,
        };
        gpio.line.level.store(true, Ordering::SeqCst);
        gpio
    }

    /// Handle for observing and driving this line from a test
    pub fn probe(&self) -> MockGpioProbe {
        MockGpioProbe {
            line: Arc::clone(&self.line),
        }
    }

    fn drive(&mut self, level: bool) -> Result<()> {
        if !self.mode.is_output() {
            return Err(PlatformError::Gpio(GpioError::InvalidMode));
        }
        if self.line.fail.load(Ordering::SeqCst) {
            return Err(PlatformError::Gpio(GpioError::Hal));
        }
        self.line.level.store(level, Ordering::SeqCst);
        self.line.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MockGpioProbe {
    /// Current line level
    pub fn level(&self) -> bool {
        self.line.level.load(Ordering::SeqCst)
    }

    /// Simulate an external signal on an input line
    pub fn set_level(&self, high: bool) {
        self.line.level.store(high, Ordering::SeqCst);
    }

    /// Number of successful output writes
    pub fn writes(&self) -> u32 {
        self.line.writes.load(Ordering::SeqCst)
    }

    /// Make every following output write fail with a HAL error
    pub fn fail_writes(&self, fail: bool) {
        self.line.fail.store(fail, Ordering::SeqCst);
    }
}

impl GpioInterface for MockGpio {
    fn set_high(&mut self) -> Result<()> {
        self.drive(true)
    }

    fn set_low(&mut self) -> Result<()> {
        self.drive(false)
    }

    fn read(&mut self) -> Result<bool> {
        Ok(self.line.level.load(Ordering::SeqCst))
    }

    fn mode(&self) -> GpioMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_gpio_output() {
        let mut gpio = MockGpio::new_output();
        let probe = gpio.probe();
        assert!(!probe.level());

        gpio.set_high().unwrap();
        assert!(probe.level());

        gpio.set_low().unwrap();
        assert!(!probe.level());
        assert_eq!(probe.writes(), 2);
    }

    #[test]
    fn test_mock_gpio_input() {
        let mut gpio = MockGpio::new_input_pull_up();
        let probe = gpio.probe();
        assert!(gpio.read().unwrap());

        // Simulate external signal
        probe.set_level(false);
        assert!(!gpio.read().unwrap());

        // Input mode should not allow set_high/set_low
        assert_eq!(
            gpio.set_high(),
            Err(PlatformError::Gpio(GpioError::InvalidMode))
        );
        assert!(gpio.set_low().is_err());
    }

    #[test]
    fn test_mock_gpio_injected_failure() {
        let mut gpio = MockGpio::new_output();
        let probe = gpio.probe();

        probe.fail_writes(true);
        assert_eq!(gpio.set_high(), Err(PlatformError::Gpio(GpioError::Hal)));
        assert!(!probe.level());

        probe.fail_writes(false);
        assert!(gpio.set_high().is_ok());
    }
}

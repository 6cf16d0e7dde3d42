//! embedded-hal adapters
//!
//! Wraps any `embedded-hal` 1.0 digital pin so it can be handed to the LED
//! active object or the button task as a [`GpioInterface`]. HAL-specific error
//! types collapse into `GpioError::Hal`.

use crate::platform::{
    error::{GpioError, PlatformError},
    traits::{GpioInterface, GpioMode},
    Result,
};
use embedded_hal::digital::{InputPin, StatefulOutputPin};

fn hal_error<E>(_: E) -> PlatformError {
    PlatformError::Gpio(GpioError::Hal)
}

/// Push-pull output line backed by an embedded-hal pin
pub struct HalOutput<P> {
    pin: P,
}

impl<P: StatefulOutputPin> HalOutput<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Release the wrapped pin
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: StatefulOutputPin> GpioInterface for HalOutput<P> {
    fn set_high(&mut self) -> Result<()> {
        self.pin.set_high().map_err(hal_error)
    }

    fn set_low(&mut self) -> Result<()> {
        self.pin.set_low().map_err(hal_error)
    }

    fn read(&mut self) -> Result<bool> {
        self.pin.is_set_high().map_err(hal_error)
    }

    fn mode(&self) -> GpioMode {
        GpioMode::OutputPushPull
    }
}

/// Input line backed by an embedded-hal pin
pub struct HalInput<P> {
    pin: P,
    mode: GpioMode,
}

impl<P: InputPin> HalInput<P> {
    /// Wrap a pin that the HAL already configured with a pull-up
    pub fn pull_up(pin: P) -> Self {
        Self {
            pin,
            mode: GpioMode::InputPullUp,
        }
    }

    /// Wrap a floating input
    pub fn floating(pin: P) -> Self {
        Self {
            pin,
            mode: GpioMode::Input,
        }
    }
}

impl<P: InputPin> GpioInterface for HalInput<P> {
    fn set_high(&mut self) -> Result<()> {
        Err(PlatformError::Gpio(GpioError::InvalidMode))
    }

    fn set_low(&mut self) -> Result<()> {
        Err(PlatformError::Gpio(GpioError::InvalidMode))
    }

    fn read(&mut self) -> Result<bool> {
        self.pin.is_high().map_err(hal_error)
    }

    fn mode(&self) -> GpioMode {
        self.mode
    }
}

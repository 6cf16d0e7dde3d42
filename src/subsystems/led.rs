//! LED active object
//!
//! Each LED line is owned by its own active object. Requests carry an action
//! code and a value; BLINK lights the LED for `value_ms` and then turns it off,
//! holding the object busy for the whole blink.

use crate::config::{LedConfig, LED_MAILBOX_DEPTH};
use crate::core::active_object::{ActiveObject, Handler, Status};
use crate::core::traits::TimeSource;
use crate::platform::GpioInterface;
use core::fmt;

/// LED colors, one line each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedColor {
    Red,
    Green,
    Blue,
}

impl LedColor {
    pub const ALL: [LedColor; 3] = [LedColor::Red, LedColor::Green, LedColor::Blue];

    /// Position in [`LedColor::ALL`].
    pub const fn index(self) -> usize {
        match self {
            LedColor::Red => 0,
            LedColor::Green => 1,
            LedColor::Blue => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            LedColor::Red => "red",
            LedColor::Green => "green",
            LedColor::Blue => "blue",
        }
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Action codes understood by the LED handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedAction {
    On,
    Off,
    Blink,
    /// Raw code with no meaning; answered with `InvalidAction`
    Unknown(u8),
}

impl From<u8> for LedAction {
    fn from(code: u8) -> Self {
        match code {
            0 => LedAction::On,
            1 => LedAction::Off,
            2 => LedAction::Blink,
            other => LedAction::Unknown(other),
        }
    }
}

impl From<LedAction> for u8 {
    fn from(action: LedAction) -> Self {
        match action {
            LedAction::On => 0,
            LedAction::Off => 1,
            LedAction::Blink => 2,
            LedAction::Unknown(code) => code,
        }
    }
}

/// Payload of an LED request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedCommand {
    pub action: LedAction,
    /// Blink duration in ms; ignored by ON and OFF
    pub value_ms: i32,
}

impl LedCommand {
    pub const fn on() -> Self {
        Self {
            action: LedAction::On,
            value_ms: 0,
        }
    }

    pub const fn off() -> Self {
        Self {
            action: LedAction::Off,
            value_ms: 0,
        }
    }

    pub const fn blink(value_ms: i32) -> Self {
        Self {
            action: LedAction::Blink,
            value_ms,
        }
    }
}

/// Drives one LED line.
pub struct LedHandler<G, T> {
    color: LedColor,
    gpio: G,
    time: T,
}

impl<G: GpioInterface, T: TimeSource> LedHandler<G, T> {
    pub const fn new(color: LedColor, gpio: G, time: T) -> Self {
        Self { color, gpio, time }
    }

    pub fn color(&self) -> LedColor {
        self.color
    }

    fn drive(&mut self, on: bool) -> Status {
        let result = if on {
            self.gpio.set_high()
        } else {
            self.gpio.set_low()
        };
        match result {
            Ok(()) => Status::Ok,
            Err(e) => {
                crate::log_error!("LED {}: {}", self.color, e);
                Status::HardwareError
            }
        }
    }
}

impl<G: GpioInterface, T: TimeSource> Handler for LedHandler<G, T> {
    type Payload = LedCommand;

    async fn handle(&mut self, command: &LedCommand) -> Status {
        match command.action {
            LedAction::On => {
                crate::log_info!("LED {} on", self.color);
                self.drive(true)
            }
            LedAction::Off => {
                crate::log_info!("LED {} off", self.color);
                self.drive(false)
            }
            LedAction::Blink => {
                let Ok(duration_ms) = u32::try_from(command.value_ms) else {
                    crate::log_warn!("LED {}: invalid blink time {}", self.color, command.value_ms);
                    return Status::InvalidParams;
                };
                if duration_ms == 0 {
                    crate::log_warn!("LED {}: invalid blink time 0", self.color);
                    return Status::InvalidParams;
                }
                crate::log_info!("LED {} blink {} ms", self.color, duration_ms);
                match self.drive(true) {
                    Status::Ok => {}
                    failed => return failed,
                }
                self.time.sleep_ms(duration_ms).await;
                self.drive(false)
            }
            LedAction::Unknown(code) => {
                crate::log_error!("LED {}: unknown action {}", self.color, code);
                Status::InvalidAction
            }
        }
    }
}

/// Active object owning one LED line.
pub type LedActiveObject<G, T> = ActiveObject<LedHandler<G, T>, LED_MAILBOX_DEPTH>;

/// Build the active object for `color`.
pub const fn led_active_object<G: GpioInterface, T: TimeSource>(
    color: LedColor,
    gpio: G,
    time: T,
    config: LedConfig,
) -> LedActiveObject<G, T> {
    ActiveObject::new(
        color.name(),
        LedHandler::new(color, gpio, time),
        config.idle_timeout_ms,
    )
}

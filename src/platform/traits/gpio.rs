//! GPIO line trait
//!
//! LED lines are driven through [`GpioInterface`] by their owning active
//! object; the button line is sampled through it by the button task. Each line
//! has exactly one owner, so no method needs interior locking.

use crate::platform::Result;

/// How a line is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioMode {
    /// Floating input
    Input,
    /// Input with the internal pull-up enabled (button to ground)
    InputPullUp,
    /// Push-pull output (LED)
    OutputPushPull,
}

impl GpioMode {
    /// Whether the line may be driven in this mode
    pub const fn is_output(self) -> bool {
        matches!(self, GpioMode::OutputPushPull)
    }
}

/// One digital line owned by a single task.
pub trait GpioInterface {
    /// Drive the line to logic 1.
    ///
    /// Input lines answer `GpioError::InvalidMode`.
    fn set_high(&mut self) -> Result<()>;

    /// Drive the line to logic 0.
    fn set_low(&mut self) -> Result<()>;

    /// Current logic level; for outputs, the level last driven.
    fn read(&mut self) -> Result<bool>;

    fn mode(&self) -> GpioMode;
}

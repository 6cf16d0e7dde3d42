//! Platform abstraction layer
//!
//! Hardware access for the firmware goes through the traits in this module:
//! GPIO lines for the LEDs and the button, and a DMA transmit port for the UART.
//! Board bring-up code binds them to real peripherals; host tests use `mock`.

pub mod error;
pub mod hal;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{PlatformError, Result};
pub use traits::{GpioInterface, UartDmaPort};

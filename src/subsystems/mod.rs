//! Application subsystems
//!
//! - `button`: debounced press classifier and its sampling task
//! - `ui`: event inbox and the LED arbitration active object
//! - `led`: one active object per LED line
//! - `uart`: DMA transmit active object
//! - `log_sink`: logger subscriber feeding the UART

pub mod button;
pub mod led;
pub mod log_sink;
pub mod uart;
pub mod ui;

//! Mock platform implementation for testing
//!
//! This module provides mock implementations of platform traits that can be used
//! for unit testing without requiring actual hardware. Each mock hands out a
//! cloneable probe so a test can keep observing (and driving) the line or port
//! after ownership of the mock moved into an active object.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled

#![cfg(any(test, feature = "mock"))]

mod gpio;
mod uart;

pub use gpio::{MockGpio, MockGpioProbe};
pub use uart::{MockUartPort, MockUartProbe};

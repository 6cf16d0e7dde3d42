#![cfg_attr(not(any(test, feature = "mock")), no_std)]

//! ao_firmware - button to LED firmware built on active objects
//!
//! A debounced button is classified by press length, the classified event
//! travels through a three-level priority mailbox to the UI active object,
//! which lights one LED at a time through per-LED active objects. Log output
//! is streamed to a UART by DMA.

// Logging macros must be defined before the modules that use them.
#[macro_use]
pub mod core;

// Platform abstraction layer
pub mod platform;

// Tunables and firmware constants
pub mod config;

// Button, LED, UI and UART active objects
pub mod subsystems;

// Boot-time wiring
pub mod app;

#[cfg(test)]
pub(crate) mod test_support;

//! Core runtime
//!
//! The concurrency substrate shared by every subsystem: ring buffer, block
//! pool, priority mailbox, the active object runtime, and logging.

#[macro_use]
pub mod logging;

pub mod active_object;
pub mod log_buffer;
pub mod log_router;
pub mod mailbox;
pub mod pool;
pub mod ring_buffer;
pub mod traits;

//! Platform-agnostic seams used by the core runtime
//!
//! - [`SharedState`] / [`CriticalState`]: short, interrupt-safe critical sections
//! - [`TimeSource`]: monotonic clock plus async sleep

pub mod sync;
pub mod time;

pub use sync::{CriticalState, SharedState};
#[cfg(feature = "embassy")]
pub use time::EmbassyTime;
pub use time::TimeSource;

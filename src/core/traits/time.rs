//! Time abstraction for platform-agnostic timing operations.
//!
//! The runtime needs two things from a clock: a monotonic millisecond reading
//! (button sampling, mailbox timestamps) and an async sleep (idle timeouts,
//! bounded lock waits, blink durations, flush polling). Both come from one
//! [`TimeSource`] so tests can swap in a virtual clock.

/// Platform-agnostic time source.
///
/// - `EmbassyTime` (feature `embassy`) on target
/// - a `tokio::time` backed clock in host tests
///
/// # Example
///
/// ```ignore
/// async fn wait_stable<T: TimeSource>(time: &T, since_ms: u64, window_ms: u64) {
///     while time.now_ms().saturating_sub(since_ms) < window_ms {
///         time.sleep_ms(1).await;
///     }
/// }
/// ```
#[allow(async_fn_in_trait)]
pub trait TimeSource {
    /// Returns current time in milliseconds since system start.
    fn now_ms(&self) -> u64;

    /// Returns current time in microseconds since system start.
    fn now_us(&self) -> u64;

    /// Returns elapsed time in microseconds since a reference point.
    ///
    /// Uses saturating subtraction to handle potential overflow.
    fn elapsed_since(&self, reference_us: u64) -> u64 {
        self.now_us().saturating_sub(reference_us)
    }

    /// Suspend the calling task for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u32);
}

impl<T: TimeSource> TimeSource for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    async fn sleep_ms(&self, ms: u32) {
        (**self).sleep_ms(ms).await
    }
}

// ============================================================================
// Embassy Implementation
// ============================================================================

/// Embassy-based time source backed by the `embassy-time` driver.
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTime;

#[cfg(feature = "embassy")]
impl EmbassyTime {
    /// Milliseconds since boot, usable as a [`LogClock`](crate::core::log_router::LogClock)
    pub fn uptime_ms() -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

#[cfg(feature = "embassy")]
impl TimeSource for EmbassyTime {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    fn now_us(&self) -> u64 {
        embassy_time::Instant::now().as_micros()
    }

    async fn sleep_ms(&self, ms: u32) {
        embassy_time::Timer::after_millis(u64::from(ms)).await
    }
}

//! Host test helpers: a tokio-backed clock, a local-set launcher and the
//! process-wide test logger.

use crate::core::active_object::{ActiveObject, Handler, Launch, LaunchError};
use crate::core::log_buffer::{LogLevel, MemoryLogSink};
use crate::core::log_router::Logger;
use crate::core::traits::TimeSource;
use std::cell::Cell;
use std::future::Future;
use std::sync::Once;
use std::time::Duration;
use tokio::time::Instant;

/// Clock on tokio's (pausable) timer
#[derive(Debug, Clone, Copy)]
pub struct TokioTime {
    origin: Instant,
}

impl TokioTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioTime {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    async fn sleep_ms(&self, ms: u32) {
        tokio::time::sleep(Duration::from_millis(u64::from(ms))).await
    }
}

/// Spawns serving tasks onto the current `LocalSet`
pub struct LocalLauncher {
    time: TokioTime,
    launches: Cell<u32>,
    refuse: Cell<bool>,
}

impl LocalLauncher {
    pub fn new() -> Self {
        Self {
            time: TokioTime::new(),
            launches: Cell::new(0),
            refuse: Cell::new(false),
        }
    }

    pub fn launches(&self) -> u32 {
        self.launches.get()
    }

    /// Make following launches fail
    pub fn refuse(&self, refuse: bool) {
        self.refuse.set(refuse);
    }
}

impl<H, const N: usize> Launch<ActiveObject<H, N>> for LocalLauncher
where
    H: Handler + 'static,
    H::Payload: 'static,
{
    fn launch(&self, ao: &'static ActiveObject<H, N>) -> Result<(), LaunchError> {
        if self.refuse.get() {
            return Err(LaunchError::Failed);
        }
        self.launches.set(self.launches.get() + 1);
        let time = self.time;
        tokio::task::spawn_local(async move { ao.serve(time).await });
        Ok(())
    }
}

/// Run `fut` inside a fresh `LocalSet`
pub async fn run_local<F: Future>(fut: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(fut).await
}

/// Let spawned tasks run for `ms` of (virtual) time
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await
}

static LOGGER: Logger = Logger::new();
static CAPTURE: MemoryLogSink = MemoryLogSink::new();
static INSTALL: Once = Once::new();

/// The logger installed for the whole test binary and its capture sink
///
/// Installed on first use with the capture sink subscribed at `Debug`.
pub fn test_logger() -> (&'static Logger, &'static MemoryLogSink) {
    INSTALL.call_once(|| {
        LOGGER.install().expect("test logger installed twice");
        LOGGER
            .subscribe(&CAPTURE, LogLevel::Debug)
            .expect("capture sink");
    });
    (&LOGGER, &CAPTURE)
}

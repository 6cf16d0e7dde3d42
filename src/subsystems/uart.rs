//! UART transmit active object
//!
//! One object owns the serial peripheral. Any number of producers copy bytes
//! into a bounded stream buffer with [`UartActiveObject::post`]; the owning
//! task drains it in chunks of at most `CHUNK` bytes and hands each chunk to
//! the DMA engine:
//!
//! ```text
//!  post() ──┐
//!  post() ──┼─► stream (CAP bytes) ─► run(): chunk ─► dma_start ─┐
//!  post() ──┘                          ▲                         │
//!                                      └── on_dma_complete() ◄───┘ (ISR)
//! ```
//!
//! Exactly one transfer is outstanding at a time. The DMA interrupt only
//! clears the in-flight flag and wakes the task; it never touches the stream.

use crate::config::{UART_DMA_CHUNK, UART_STREAM_CAPACITY};
use crate::core::traits::{CriticalState, SharedState, TimeSource};
use crate::platform::{PlatformError, UartDmaPort};
use core::convert::Infallible;
use core::future::poll_fn;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::Poll;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_sync::waitqueue::AtomicWaker;

/// Transmit counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartStats {
    /// DMA transfers completed
    pub transfers: u32,
    pub bytes_sent: u32,
    /// Bytes refused by `post` because the stream was full, or lost to a failed start
    pub dropped_bytes: u32,
    pub dma_errors: u32,
}

/// Interrupt-to-task handoff: a flag plus one waker, no payload.
struct DmaCompletion {
    in_flight: AtomicBool,
    failed: AtomicBool,
    waker: AtomicWaker,
}

impl DmaCompletion {
    const fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        }
    }

    fn begin(&self) {
        self.failed.store(false, Ordering::Relaxed);
        self.in_flight.store(true, Ordering::Release);
    }

    fn signal(&self) {
        self.in_flight.store(false, Ordering::Release);
        self.waker.wake();
    }

    fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait for the ISR; returns whether the transfer reported an error.
    async fn wait(&self) -> bool {
        poll_fn(|cx| {
            self.waker.register(cx.waker());
            if self.in_flight() {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;
        self.failed.load(Ordering::Relaxed)
    }
}

/// Owner of the UART transmit path.
pub struct UartActiveObject<const CAP: usize = UART_STREAM_CAPACITY, const CHUNK: usize = UART_DMA_CHUNK> {
    stream: Pipe<CriticalSectionRawMutex, CAP>,
    dma: DmaCompletion,
    stats: CriticalState<UartStats>,
}

impl<const CAP: usize, const CHUNK: usize> UartActiveObject<CAP, CHUNK> {
    pub const fn new() -> Self {
        const { assert!(CHUNK > 0 && CHUNK <= CAP) };
        Self {
            stream: Pipe::new(),
            dma: DmaCompletion::new(),
            stats: CriticalState::new(UartStats {
                transfers: 0,
                bytes_sent: 0,
                dropped_bytes: 0,
                dma_errors: 0,
            }),
        }
    }

    /// Copy as much of `bytes` as fits into the stream. Never waits.
    ///
    /// Returns the number of bytes accepted; the rest is counted as dropped.
    /// The accepted prefix lands contiguously even when it wraps the stream.
    pub fn post(&self, bytes: &[u8]) -> usize {
        let accepted = critical_section::with(|_| self.push(bytes));
        self.count_dropped(bytes.len() - accepted);
        accepted
    }

    pub fn post_str(&self, s: &str) -> usize {
        self.post(s.as_bytes())
    }

    /// Queue `bytes` whole or not at all.
    ///
    /// Lines from concurrent producers never interleave.
    pub fn post_line(&self, bytes: &[u8]) -> bool {
        let queued = critical_section::with(|_| {
            if self.stream.free_capacity() < bytes.len() {
                return false;
            }
            self.push(bytes);
            true
        });
        if !queued {
            self.count_dropped(bytes.len());
        }
        queued
    }

    /// Wait until every posted byte has left the DMA engine.
    ///
    /// Polls every millisecond; `false` if `timeout_ms` ran out first.
    pub async fn flush<T: TimeSource>(&self, timeout_ms: u32, time: &T) -> bool {
        let start = time.now_ms();
        loop {
            if self.is_idle() {
                return true;
            }
            if time.now_ms().saturating_sub(start) >= u64::from(timeout_ms) {
                return false;
            }
            time.sleep_ms(1).await;
        }
    }

    /// DMA-complete interrupt entry point.
    pub fn on_dma_complete(&self) {
        self.dma.signal();
    }

    /// DMA error interrupt entry point. Ends the transfer; the chunk is not
    /// retried.
    pub fn on_dma_error(&self) {
        self.dma.failed.store(true, Ordering::Relaxed);
        self.dma.signal();
    }

    /// Stream empty and no transfer outstanding
    pub fn is_idle(&self) -> bool {
        self.stream.is_empty() && !self.dma.in_flight()
    }

    pub fn in_flight(&self) -> bool {
        self.dma.in_flight()
    }

    /// Bytes waiting in the stream
    pub fn pending(&self) -> usize {
        self.stream.len()
    }

    pub fn stats(&self) -> UartStats {
        self.stats.get()
    }

    /// Task body. Only returns if the peripheral cannot be brought up.
    ///
    /// ```ignore
    /// #[embassy_executor::task]
    /// async fn uart_task(uart: &'static UartAo, port: BoardUart) {
    ///     if let Err(e) = uart.run(port).await {
    ///         defmt::error!("uart: {}", e);
    ///     }
    /// }
    ///
    /// #[interrupt]
    /// fn DMA_IRQ_0() {
    ///     UART.on_dma_complete();
    /// }
    /// ```
    pub async fn run<P: UartDmaPort>(&self, mut port: P) -> Result<Infallible, PlatformError> {
        port.hw_init()?;
        crate::log_info!("uart: ready, {} byte chunks", CHUNK);

        let mut chunk = [0u8; CHUNK];
        loop {
            let mut len = self.stream.read(&mut chunk).await;
            while len < CHUNK {
                match self.stream.try_read(&mut chunk[len..]) {
                    Ok(n) => len += n,
                    Err(_) => break,
                }
            }

            // Bytes are out of the stream from here on; `in_flight` keeps
            // `is_idle` false until the transfer ends.
            self.dma.begin();
            if port.dma_start(&chunk[..len]).is_err() {
                self.dma.signal();
                // Not logged: the log line would come straight back here.
                self.stats.with_mut(|s| {
                    s.dma_errors = s.dma_errors.saturating_add(1);
                    s.dropped_bytes = s.dropped_bytes.saturating_add(len as u32);
                });
                continue;
            }

            let failed = self.dma.wait().await;
            self.stats.with_mut(|s| {
                if failed {
                    s.dma_errors = s.dma_errors.saturating_add(1);
                } else {
                    s.transfers = s.transfers.saturating_add(1);
                    s.bytes_sent = s.bytes_sent.saturating_add(len as u32);
                }
            });
        }
    }

    /// Caller holds the critical section; a wrapping write takes two
    /// `try_write` calls.
    fn push(&self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        while accepted < bytes.len() {
            match self.stream.try_write(&bytes[accepted..]) {
                Ok(n) => accepted += n,
                Err(_) => break,
            }
        }
        accepted
    }

    fn count_dropped(&self, n: usize) {
        if n > 0 {
            self.stats
                .with_mut(|s| s.dropped_bytes = s.dropped_bytes.saturating_add(n as u32));
        }
    }
}

impl<const CAP: usize, const CHUNK: usize> Default for UartActiveObject<CAP, CHUNK> {
    fn default() -> Self {
        Self::new()
    }
}

//! Mock DMA UART port for testing

use crate::platform::{
    error::{PlatformError, UartError},
    traits::{UartConfig, UartDmaPort},
    Result,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

#[derive(Debug, Default)]
struct PortState {
    initialized: bool,
    busy: bool,
    overlapped_starts: u32,
    transfers: Vec<Vec<u8>>,
    fail_init: bool,
    fail_next_dma: bool,
}

/// Mock DMA UART port
///
/// Records every DMA transfer. A transfer stays "busy" until the test calls
/// [`MockUartProbe::finish_transfer`], mirroring a DMA engine that only frees
/// itself when its completion interrupt fires. Starting a transfer while busy
/// is counted and rejected.
///
/// # Example
///
/// ```ignore
/// use ao_firmware::platform::mock::MockUartPort;
/// use ao_firmware::platform::traits::UartDmaPort;
///
/// let mut port = MockUartPort::new(Default::default());
/// let probe = port.probe();
///
/// port.hw_init().unwrap();
/// port.dma_start(b"Hello").unwrap();
/// assert_eq!(probe.transfers(), vec![b"Hello".to_vec()]);
/// ```
#[derive(Debug)]
pub struct MockUartPort {
    config: UartConfig,
    state: Arc<Mutex<PortState>>,
}

/// Test-side view of a [`MockUartPort`]
#[derive(Debug, Clone)]
pub struct MockUartProbe {
    state: Arc<Mutex<PortState>>,
}

fn lock(state: &Mutex<PortState>) -> MutexGuard<'_, PortState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockUartPort {
    /// Create a new mock port
    pub fn new(config: UartConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(PortState::default())),
        }
    }

    /// Handle for observing this port from a test
    pub fn probe(&self) -> MockUartProbe {
        MockUartProbe {
            state: Arc::clone(&self.state),
        }
    }

    /// Get configured baud rate
    pub fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }
}

impl UartDmaPort for MockUartPort {
    fn hw_init(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_init || self.config.baud_rate == 0 {
            return Err(PlatformError::Uart(UartError::InitFailed));
        }
        state.initialized = true;
        Ok(())
    }

    fn dma_start(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.initialized {
            return Err(PlatformError::InitializationFailed);
        }
        if state.busy {
            state.overlapped_starts += 1;
            return Err(PlatformError::Uart(UartError::DmaBusy));
        }
        if state.fail_next_dma {
            state.fail_next_dma = false;
            return Err(PlatformError::Uart(UartError::DmaFailed));
        }
        state.busy = true;
        state.transfers.push(data.to_vec());
        Ok(())
    }
}

impl MockUartProbe {
    /// All transfers started so far, in order
    pub fn transfers(&self) -> Vec<Vec<u8>> {
        lock(&self.state).transfers.clone()
    }

    /// Number of transfers started so far
    pub fn transfer_count(&self) -> usize {
        lock(&self.state).transfers.len()
    }

    /// Concatenation of all transmitted bytes
    pub fn transmitted(&self) -> Vec<u8> {
        lock(&self.state).transfers.concat()
    }

    /// Whether a transfer is outstanding
    pub fn is_busy(&self) -> bool {
        lock(&self.state).busy
    }

    /// Mark the outstanding transfer as done on the "hardware" side
    ///
    /// Returns `false` if no transfer was outstanding.
    pub fn finish_transfer(&self) -> bool {
        let mut state = lock(&self.state);
        core::mem::replace(&mut state.busy, false)
    }

    /// Number of `dma_start` calls made while a transfer was outstanding
    pub fn overlapped_starts(&self) -> u32 {
        lock(&self.state).overlapped_starts
    }

    /// Make the next `hw_init` fail
    pub fn fail_init(&self) {
        lock(&self.state).fail_init = true;
    }

    /// Make the next `dma_start` fail
    pub fn fail_next_dma(&self) {
        lock(&self.state).fail_next_dma = true;
    }
}

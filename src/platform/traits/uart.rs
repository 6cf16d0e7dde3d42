//! UART transmit port trait
//!
//! The UART active object is the only caller of this trait. A port brings the
//! peripheral up once and then accepts one DMA transfer at a time; completion is
//! reported out of band from the DMA interrupt through
//! [`UartActiveObject::on_dma_complete`](crate::subsystems::uart::UartActiveObject::on_dma_complete).

use crate::platform::Result;

/// UART configuration
#[derive(Debug, Clone, Copy)]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Data bits (typically 8)
    pub data_bits: u8,
    /// Parity mode
    pub parity: UartParity,
    /// Stop bits
    pub stop_bits: UartStopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: 8,
            parity: UartParity::None,
            stop_bits: UartStopBits::One,
        }
    }
}

/// UART parity modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartParity {
    /// No parity
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// UART stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartStopBits {
    /// One stop bit
    One,
    /// Two stop bits
    Two,
}

/// DMA-driven UART transmit port
///
/// # Safety Invariants
///
/// - `hw_init` is called exactly once, before the first `dma_start`
/// - At most one transfer is outstanding; the caller waits for the completion
///   interrupt before starting the next one
/// - `data` stays valid until the completion interrupt fires
pub trait UartDmaPort {
    /// Bring up the UART peripheral and its DMA channel
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Uart(UartError::InitFailed)` if the peripheral
    /// cannot be configured.
    fn hw_init(&mut self) -> Result<()>;

    /// Start transmitting `data` by DMA
    ///
    /// Returns as soon as the transfer is queued. Completion is signalled by the
    /// DMA interrupt, not by this call.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Uart` if the transfer could not be started.
    fn dma_start(&mut self, data: &[u8]) -> Result<()>;
}

//! Logger subscriber that writes lines to the UART.

use crate::config::LOG_MAX_MESSAGE;
use crate::core::log_buffer::LogLevel;
use crate::core::log_router::LogSink;
use crate::subsystems::uart::UartActiveObject;
use heapless::Vec;

const EOL: &[u8] = b"\r\n";

/// Posts every line, CRLF terminated, into the UART stream.
///
/// A line that does not fit in the stream is dropped whole; the sink never
/// waits for the UART.
pub struct UartLogSink<const CAP: usize, const CHUNK: usize> {
    uart: &'static UartActiveObject<CAP, CHUNK>,
}

impl<const CAP: usize, const CHUNK: usize> UartLogSink<CAP, CHUNK> {
    pub const fn new(uart: &'static UartActiveObject<CAP, CHUNK>) -> Self {
        Self { uart }
    }
}

impl<const CAP: usize, const CHUNK: usize> LogSink for UartLogSink<CAP, CHUNK> {
    fn write(&self, _level: LogLevel, line: &str) {
        let body = &line.as_bytes()[..line.len().min(LOG_MAX_MESSAGE)];
        let mut out: Vec<u8, { LOG_MAX_MESSAGE + 2 }> = Vec::new();
        // Both fit by construction.
        let _ = out.extend_from_slice(body);
        let _ = out.extend_from_slice(EOL);
        self.uart.post_line(&out);
    }
}

//! Boot-time wiring
//!
//! Every long-lived object is a `static` constructed in place; tasks and
//! interrupt handlers receive `&'static` references to the ones they use.
//! [`boot`] runs once, before any task is spawned.
//!
//! ```ignore
//! static LOGGER: Logger = Logger::new();
//! static UART: UartAo = UartAo::new();
//! static UART_LOG: UartSink = UartSink::new(&UART);
//! static UI_INBOX: EventMailbox<EmbassyTime> =
//!     EventMailbox::new(EmbassyTime, MailboxConfig::DEFAULT);
//! static UI_POOL: LedRequestPool = LedRequestPool::new();
//! static LEDS: StaticCell<[BoardLed; 3]> = StaticCell::new();
//!
//! #[embassy_executor::main]
//! async fn main(spawner: Spawner) {
//!     let config = AppConfig::default();
//!     LOGGER.set_clock(Some(EmbassyTime::uptime_ms));
//!     if let Err(e) = app::boot(&config, &LOGGER, &UART_LOG) {
//!         defmt::panic!("boot failed: {}", e);
//!     }
//!     let board = Board::init();
//!     let leds = LEDS.init(board.leds(config.led));
//!
//!     spawner.must_spawn(uart_task(&UART, board.uart));
//!     spawner.must_spawn(button_task(board.button, &UI_INBOX));
//!     let launcher = SpawnerLauncher::new(spawner, led_task);
//!     spawner.must_spawn(ui_task(UiActiveObject::new(
//!         &UI_INBOX,
//!         [&leds[0], &leds[1], &leds[2]],
//!         &UI_POOL,
//!         launcher,
//!         EmbassyTime,
//!         config.ui,
//!     )));
//! }
//! ```

use crate::config::{AppConfig, ConfigError, UART_DMA_CHUNK, UART_STREAM_CAPACITY};
use crate::core::log_buffer::LogLevel;
use crate::core::log_router::{LogError, LogSink, Logger, SubscriberId};
use crate::subsystems::log_sink::UartLogSink;
use crate::subsystems::uart::UartActiveObject;
use core::fmt;

/// UART active object with the firmware's stream and chunk sizes
pub type UartAo = UartActiveObject<UART_STREAM_CAPACITY, UART_DMA_CHUNK>;

/// Logger subscriber for [`UartAo`]
pub type UartSink = UartLogSink<UART_STREAM_CAPACITY, UART_DMA_CHUNK>;

/// Boot failure. The caller decides whether to halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppError {
    Config(ConfigError),
    Log(LogError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "config: {}", e),
            AppError::Log(e) => write!(f, "logger: {}", e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<LogError> for AppError {
    fn from(e: LogError) -> Self {
        AppError::Log(e)
    }
}

/// Validate `config`, install `logger` and route it to the UART.
pub fn boot(
    config: &AppConfig,
    logger: &'static Logger,
    uart_sink: &'static dyn LogSink,
) -> Result<SubscriberId, AppError> {
    config.validate()?;
    logger.install()?;
    let id = attach_sink(logger, uart_sink, config.log.uart_min_level)?;
    crate::log_info!(
        "boot: button {}/{}/{} ms, hold {} ms",
        config.button.pulse_ms,
        config.button.short_ms,
        config.button.long_ms,
        config.ui.hold_ms
    );
    Ok(id)
}

fn attach_sink(
    logger: &Logger,
    sink: &'static dyn LogSink,
    min_level: LogLevel,
) -> Result<SubscriberId, LogError> {
    let id = logger.subscribe(sink, min_level)?;
    if min_level == LogLevel::Off {
        crate::log_debug!("boot: UART log muted");
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_logger;
    use serial_test::serial;

    fn leak_sink() -> &'static UartSink {
        let uart: &'static UartAo = Box::leak(Box::new(UartAo::new()));
        Box::leak(Box::new(UartSink::new(uart)))
    }

    #[test]
    #[serial]
    fn test_invalid_config_stops_boot() {
        let mut config = AppConfig::default();
        config.button.long_ms = 100;
        let logger: &'static Logger = Box::leak(Box::new(Logger::new()));

        let result = boot(&config, logger, leak_sink());
        assert_eq!(result, Err(AppError::Config(ConfigError::ThresholdOrder)));
        assert_eq!(logger.subscriber_count(), 0);
    }

    #[test]
    #[serial]
    fn test_second_boot_rejected() {
        let _ = test_logger();
        let logger: &'static Logger = Box::leak(Box::new(Logger::new()));

        let result = boot(&AppConfig::default(), logger, leak_sink());
        assert_eq!(result, Err(AppError::Log(LogError::AlreadyInstalled)));
        assert_eq!(logger.subscriber_count(), 0);
    }

    #[test]
    fn test_sink_attached_at_configured_level() {
        let logger = Logger::new();
        let uart: &'static UartAo = Box::leak(Box::new(UartAo::new()));
        let sink: &'static UartSink = Box::leak(Box::new(UartSink::new(uart)));

        attach_sink(&logger, sink, LogLevel::Info).unwrap();
        logger.publish(LogLevel::Debug, format_args!("hidden"));
        assert_eq!(uart.pending(), 0);
        logger.publish(LogLevel::Info, format_args!("shown"));
        assert_eq!(uart.pending(), "[INFO] shown\r\n".len());
    }

    #[test]
    fn test_error_display() {
        let e = AppError::from(LogError::NoFreeSlot);
        assert_eq!(format!("{}", e), "logger: no free subscriber slot");
    }
}

//! Button debounce and press-duration classifier
//!
//! The button line is sampled on a fixed period. A raw level change restarts
//! the debounce window; once the level has been stable for the window, a
//! pressed level accumulates the sample period and a released level
//! classifies the accumulated time:
//!
//! ```text
//!   held < pulse           -> (noise, no event)
//!   pulse <= held < short  -> PULSE
//!   short <= held < long   -> SHORT
//!   long  <= held          -> LONG
//! ```
//!
//! Classification only happens at release, so a press in progress is never
//! reported.

use crate::config::ButtonConfig;
use crate::core::traits::TimeSource;
use crate::platform::GpioInterface;
use crate::subsystems::ui::{EventMailbox, UiEvent};

/// Result of one press/release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    None,
    Pulse,
    Short,
    Long,
}

impl ButtonState {
    /// Classify a press of `held_ms` against the configured thresholds.
    pub fn classify(held_ms: u32, config: &ButtonConfig) -> Self {
        if held_ms >= config.long_ms {
            ButtonState::Long
        } else if held_ms >= config.short_ms {
            ButtonState::Short
        } else if held_ms >= config.pulse_ms {
            ButtonState::Pulse
        } else {
            ButtonState::None
        }
    }
}

/// Debounced sampling state machine.
#[derive(Debug, Clone)]
pub struct ButtonClassifier {
    config: ButtonConfig,
    /// Debounced pressed time so far (ms)
    counter_ms: u32,
    last_raw: bool,
    debounce_deadline_ms: u64,
}

impl ButtonClassifier {
    pub const fn new(config: ButtonConfig) -> Self {
        Self {
            config,
            counter_ms: 0,
            last_raw: false,
            debounce_deadline_ms: 0,
        }
    }

    /// Feed one sample taken at `now_ms`.
    ///
    /// Returns the classification when a debounced release ends a press,
    /// `ButtonState::None` otherwise.
    pub fn sample(&mut self, pressed: bool, now_ms: u64) -> ButtonState {
        if pressed != self.last_raw {
            self.last_raw = pressed;
            self.debounce_deadline_ms = now_ms.saturating_add(u64::from(self.config.debounce_ms));
            return ButtonState::None;
        }
        if now_ms < self.debounce_deadline_ms {
            return ButtonState::None;
        }

        if pressed {
            self.counter_ms = self.counter_ms.saturating_add(self.config.sample_period_ms);
            return ButtonState::None;
        }
        if self.counter_ms == 0 {
            return ButtonState::None;
        }

        let held_ms = core::mem::take(&mut self.counter_ms);
        let state = ButtonState::classify(held_ms, &self.config);
        crate::log_debug!("button held {} ms -> {:?}", held_ms, state);
        state
    }

    /// Debounced time the current press has been held (ms)
    pub fn held_ms(&self) -> u32 {
        self.counter_ms
    }

    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }
}

/// Button sampling task body.
///
/// Reads `gpio` every `sample_period_ms` and forwards classified presses to
/// the UI inbox. Never returns.
///
/// ```ignore
/// #[embassy_executor::task]
/// async fn button_task(pin: HalInput<Input<'static>>, inbox: &'static UiInbox) {
///     run_button(pin, EmbassyTime, ButtonConfig::DEFAULT, inbox).await
/// }
/// ```
pub async fn run_button<G, T, M>(mut gpio: G, time: T, config: ButtonConfig, inbox: &EventMailbox<M>)
where
    G: GpioInterface,
    T: TimeSource,
    M: TimeSource,
{
    let mut classifier = ButtonClassifier::new(config);
    crate::log_info!("button task started");

    loop {
        match gpio.read() {
            Ok(level) => {
                let pressed = level != config.active_low;
                let state = classifier.sample(pressed, time.now_ms());
                if let Some(event) = UiEvent::from_state(state) {
                    crate::log_info!("button: {:?}", event);
                    // The inbox logs refusals itself.
                    let _ = inbox.send_event(event).await;
                }
            }
            Err(e) => crate::log_warn!("button read failed: {}", e),
        }
        time.sleep_ms(config.sample_period_ms).await;
    }
}

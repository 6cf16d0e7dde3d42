//! UI active object
//!
//! Consumes classified button events from a priority mailbox and keeps at
//! most one LED lit:
//!
//! | Event | Priority | LED   |
//! |-------|----------|-------|
//! | PULSE | HIGH     | red   |
//! | SHORT | MEDIUM   | green |
//! | LONG  | LOW      | blue  |
//!
//! A new event turns the previously lit LED off before lighting the mapped
//! one. With no further events the LED is released `UiConfig::hold_ms` after
//! it was lit. LED requests are drawn from a fixed pool; a request that cannot
//! be allocated or queued is logged and skipped.
//!
//! The UI only forgets the lit LED once its OFF request was accepted. A
//! refused OFF keeps the LED recorded as lit, blocks lighting another one and
//! is retried after [`RELEASE_RETRY_MS`].

use crate::config::{MailboxConfig, UiConfig, UI_MAILBOX_DEPTH, UI_POOL_BLOCKS};
use crate::core::active_object::{AoSendError, Completion, Launch, MessageId, Request, Status};
use crate::core::mailbox::{PriorityMailbox, Priority};
use crate::core::pool::MemoryPool;
use crate::core::traits::TimeSource;
use crate::platform::GpioInterface;
use crate::subsystems::button::ButtonState;
use crate::subsystems::led::{LedActiveObject, LedColor, LedCommand};
use embassy_futures::select::{select, Either};

/// Classified button event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiEvent {
    Pulse,
    Short,
    Long,
}

impl UiEvent {
    /// Fixed mailbox priority of the event
    pub const fn priority(self) -> Priority {
        match self {
            UiEvent::Pulse => Priority::High,
            UiEvent::Short => Priority::Medium,
            UiEvent::Long => Priority::Low,
        }
    }

    /// LED lit by the event
    pub const fn color(self) -> LedColor {
        match self {
            UiEvent::Pulse => LedColor::Red,
            UiEvent::Short => LedColor::Green,
            UiEvent::Long => LedColor::Blue,
        }
    }

    /// `None` for presses too short to count
    pub const fn from_state(state: ButtonState) -> Option<Self> {
        match state {
            ButtonState::None => None,
            ButtonState::Pulse => Some(UiEvent::Pulse),
            ButtonState::Short => Some(UiEvent::Short),
            ButtonState::Long => Some(UiEvent::Long),
        }
    }
}

/// Inbox of the UI active object.
pub struct EventMailbox<T> {
    mailbox: PriorityMailbox<UiEvent, T, UI_MAILBOX_DEPTH>,
}

impl<T: TimeSource> EventMailbox<T> {
    pub const fn new(time: T, config: MailboxConfig) -> Self {
        Self {
            mailbox: PriorityMailbox::new(time, config),
        }
    }

    /// Queue `event` at its fixed priority. `false` if it was not accepted.
    pub async fn send_event(&self, event: UiEvent) -> bool {
        match self.mailbox.send(event.priority(), event).await {
            Ok(()) => true,
            Err(e) => {
                crate::log_warn!("ui inbox: {:?} dropped: {}", event, e);
                false
            }
        }
    }

    /// Highest-priority pending event, without waiting.
    pub async fn receive_event(&self) -> Option<UiEvent> {
        self.mailbox.receive().await.ok().map(|m| m.payload)
    }

    /// Wait for the next event. `None` only on lock timeout.
    pub async fn next_event(&self) -> Option<UiEvent> {
        self.mailbox.recv().await.ok().map(|m| m.payload)
    }

    pub fn mailbox(&self) -> &PriorityMailbox<UiEvent, T, UI_MAILBOX_DEPTH> {
        &self.mailbox
    }
}

/// Delay before retrying an OFF request that could not be queued (ms)
pub const RELEASE_RETRY_MS: u32 = 50;

/// Pool the UI draws LED requests from.
pub type LedRequestPool = MemoryPool<Request<LedCommand>, UI_POOL_BLOCKS>;

fn log_completion(id: MessageId, status: Status) {
    match status {
        Status::Ok => crate::log_debug!("ui: led request {} done", id),
        other => crate::log_warn!("ui: led request {} failed: {:?}", id, other),
    }
}

/// Arbitrates the LEDs in response to button events.
pub struct UiActiveObject<'a, G, T, M, L>
where
    G: GpioInterface + 'static,
    T: TimeSource + 'static,
{
    inbox: &'a EventMailbox<M>,
    leds: [&'static LedActiveObject<G, T>; 3],
    pool: &'static LedRequestPool,
    launcher: L,
    time: T,
    config: UiConfig,
    on_complete: Completion,
    next_id: MessageId,
    active: Option<LedColor>,
    release_at_ms: u64,
}

impl<'a, G, T, M, L> UiActiveObject<'a, G, T, M, L>
where
    G: GpioInterface + 'static,
    T: TimeSource + 'static,
    M: TimeSource,
    L: Launch<LedActiveObject<G, T>>,
{
    /// `leds` is indexed by [`LedColor::index`].
    pub fn new(
        inbox: &'a EventMailbox<M>,
        leds: [&'static LedActiveObject<G, T>; 3],
        pool: &'static LedRequestPool,
        launcher: L,
        time: T,
        config: UiConfig,
    ) -> Self {
        Self {
            inbox,
            leds,
            pool,
            launcher,
            time,
            config,
            on_complete: log_completion,
            next_id: 1,
            active: None,
            release_at_ms: 0,
        }
    }

    /// Replace the completion callback attached to every LED request.
    pub fn with_completion(mut self, on_complete: Completion) -> Self {
        self.on_complete = on_complete;
        self
    }

    /// LED currently held on, if any
    pub fn active(&self) -> Option<LedColor> {
        self.active
    }

    /// Task body: all LEDs off, then serve events forever.
    pub async fn run(mut self) {
        crate::log_info!("ui task started");
        self.all_off();
        loop {
            self.step().await;
        }
    }

    /// Wait for one event or the hold deadline and act on it.
    pub async fn step(&mut self) {
        let Some(color) = self.active else {
            if let Some(event) = self.inbox.next_event().await {
                self.on_event(event);
            }
            return;
        };

        let remaining = self.release_at_ms.saturating_sub(self.time.now_ms());
        let hold = u32::try_from(remaining).unwrap_or(u32::MAX);
        match select(self.inbox.next_event(), self.time.sleep_ms(hold)).await {
            Either::First(Some(event)) => self.on_event(event),
            Either::First(None) => {}
            Either::Second(()) => {
                crate::log_info!("ui: hold expired, LED {} off", color);
                self.release(color);
            }
        }
    }

    /// Switch the lit LED to the one mapped to `event`.
    pub fn on_event(&mut self, event: UiEvent) {
        let color = event.color();
        crate::log_info!("ui: {:?} -> LED {}", event, color);

        if let Some(previous) = self.active {
            if previous != color && !self.release(previous) {
                crate::log_warn!("ui: LED {} still on, {:?} skipped", previous, event);
                return;
            }
        }
        if self.command(color, LedCommand::on()) {
            self.active = Some(color);
            self.release_at_ms = self.deadline(self.config.hold_ms);
        }
    }

    /// Send OFF to the lit LED. On refusal it stays recorded as lit and the
    /// release is retried shortly.
    fn release(&mut self, color: LedColor) -> bool {
        if self.command(color, LedCommand::off()) {
            self.active = None;
            true
        } else {
            self.release_at_ms = self.deadline(RELEASE_RETRY_MS);
            false
        }
    }

    fn deadline(&self, after_ms: u32) -> u64 {
        self.time.now_ms().saturating_add(u64::from(after_ms))
    }

    fn all_off(&mut self) {
        for color in LedColor::ALL {
            self.command(color, LedCommand::off());
        }
        self.active = None;
    }

    fn command(&mut self, color: LedColor, command: LedCommand) -> bool {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let Ok(request) = self.pool.alloc(Request::new(id, command, self.on_complete)) else {
            crate::log_warn!("ui: request pool exhausted, {:?} for {} skipped", command.action, color);
            return false;
        };

        match self.leds[color.index()].send(request, &self.launcher) {
            Ok(()) => true,
            Err(AoSendError::MailboxFull(request)) => {
                drop(request);
                crate::log_warn!("ui: LED {} mailbox full, request {} dropped", color, id);
                false
            }
            Err(AoSendError::Launch(e, request)) => {
                drop(request);
                crate::log_error!("ui: LED {} not started: {}", color, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedConfig;
    use crate::core::active_object::Pooled;
    use crate::platform::mock::{MockGpio, MockGpioProbe};
    use crate::subsystems::led::led_active_object;
    use crate::test_support::{run_local, settle, LocalLauncher, TokioTime};
    use std::cell::RefCell;
    use std::time::Duration;

    type Led = LedActiveObject<MockGpio, TokioTime>;

    fn leak_inbox() -> &'static EventMailbox<TokioTime> {
        Box::leak(Box::new(EventMailbox::new(
            TokioTime::new(),
            MailboxConfig::default(),
        )))
    }

    fn leak_leds() -> ([&'static Led; 3], [MockGpioProbe; 3]) {
        let make = |color: LedColor| {
            let gpio = MockGpio::new_output();
            let probe = gpio.probe();
            let led: &'static Led = Box::leak(Box::new(led_active_object(
                color,
                gpio,
                TokioTime::new(),
                LedConfig::default(),
            )));
            (led, probe)
        };
        let (red, red_probe) = make(LedColor::Red);
        let (green, green_probe) = make(LedColor::Green);
        let (blue, blue_probe) = make(LedColor::Blue);
        ([red, green, blue], [red_probe, green_probe, blue_probe])
    }

    fn leak_pool() -> &'static LedRequestPool {
        Box::leak(Box::new(MemoryPool::new()))
    }

    /// Take every free block so the UI cannot allocate.
    fn hold_all(pool: &'static LedRequestPool) -> Vec<Pooled<LedCommand>> {
        let mut held = Vec::new();
        while let Ok(block) = pool.alloc(Request::new(0, LedCommand::off(), log_completion)) {
            held.push(block);
        }
        held
    }

    fn lit(probes: &[MockGpioProbe; 3]) -> Vec<LedColor> {
        LedColor::ALL
            .into_iter()
            .filter(|c| probes[c.index()].level())
            .collect()
    }

    // ========================================================================
    // Event mapping and inbox ordering
    // ========================================================================

    #[test]
    fn test_event_mapping() {
        assert_eq!(UiEvent::Pulse.priority(), Priority::High);
        assert_eq!(UiEvent::Long.priority(), Priority::Low);
        assert_eq!(UiEvent::Short.color(), LedColor::Green);
        assert_eq!(UiEvent::from_state(ButtonState::None), None);
        assert_eq!(UiEvent::from_state(ButtonState::Long), Some(UiEvent::Long));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_order_matching_priority() {
        let inbox = leak_inbox();
        assert!(inbox.send_event(UiEvent::Pulse).await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(inbox.send_event(UiEvent::Short).await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(inbox.send_event(UiEvent::Long).await);

        assert_eq!(inbox.receive_event().await, Some(UiEvent::Pulse));
        assert_eq!(inbox.receive_event().await, Some(UiEvent::Short));
        assert_eq!(inbox.receive_event().await, Some(UiEvent::Long));
        assert_eq!(inbox.receive_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_overtakes_earlier_long() {
        let inbox = leak_inbox();
        assert!(inbox.send_event(UiEvent::Long).await);
        assert!(inbox.send_event(UiEvent::Pulse).await);

        assert_eq!(inbox.receive_event().await, Some(UiEvent::Pulse));
        assert_eq!(inbox.receive_event().await, Some(UiEvent::Long));
    }

    // ========================================================================
    // LED arbitration
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_single_led_lit_and_released_after_hold() {
        run_local(async {
            let inbox = leak_inbox();
            let (leds, probes) = leak_leds();
            let pool: &'static LedRequestPool = Box::leak(Box::new(MemoryPool::new()));
            let ui = UiActiveObject::new(
                inbox,
                leds,
                pool,
                LocalLauncher::new(),
                TokioTime::new(),
                UiConfig::default(),
            );
            tokio::task::spawn_local(ui.run());

            settle(10).await;
            assert!(lit(&probes).is_empty());
            // Boot switched every LED off once.
            assert!(probes.iter().all(|p| p.writes() == 1));

            inbox.send_event(UiEvent::Pulse).await;
            settle(10).await;
            assert_eq!(lit(&probes), vec![LedColor::Red]);

            inbox.send_event(UiEvent::Long).await;
            settle(10).await;
            assert_eq!(lit(&probes), vec![LedColor::Blue]);

            settle(1100).await;
            assert!(lit(&probes).is_empty());

            // Every request has completed by now.
            settle(100).await;
            let stats = pool.stats();
            assert_eq!(pool.in_use(), 0);
            assert_eq!(stats.acquired, stats.released);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_skips_action() {
        run_local(async {
            let inbox = leak_inbox();
            let (leds, probes) = leak_leds();
            let pool: &'static LedRequestPool = Box::leak(Box::new(MemoryPool::new()));

            // Hold every block so the UI cannot allocate.
            let held: Vec<_> = (0..UI_POOL_BLOCKS)
                .map(|i| {
                    pool.alloc(Request::new(i as MessageId, LedCommand::off(), log_completion))
                        .unwrap()
                })
                .collect();

            let mut ui = UiActiveObject::new(
                inbox,
                leds,
                pool,
                LocalLauncher::new(),
                TokioTime::new(),
                UiConfig::default(),
            );
            ui.on_event(UiEvent::Short);
            settle(10).await;
            assert_eq!(ui.active(), None);
            assert!(lit(&probes).is_empty());
            assert_eq!(pool.stats().exhausted, 1);

            drop(held);
            ui.on_event(UiEvent::Short);
            settle(10).await;
            assert_eq!(ui.active(), Some(LedColor::Green));
            assert_eq!(lit(&probes), vec![LedColor::Green]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_returns_block_to_pool() {
        run_local(async {
            let inbox = leak_inbox();
            let (leds, probes) = leak_leds();
            let pool = leak_pool();
            let launcher: &'static LocalLauncher = Box::leak(Box::new(LocalLauncher::new()));
            launcher.refuse(true);

            let mut ui = UiActiveObject::new(
                inbox,
                leds,
                pool,
                launcher,
                TokioTime::new(),
                UiConfig::default(),
            );
            for _ in 0..UI_POOL_BLOCKS {
                ui.on_event(UiEvent::Pulse);
                assert_eq!(ui.active(), None);
            }
            assert_eq!(leds[LedColor::Red.index()].pending(), 0);
            assert_eq!(pool.in_use(), 0);

            // Other LEDs are not starved once launches work again.
            launcher.refuse(false);
            ui.on_event(UiEvent::Short);
            settle(10).await;
            assert_eq!(ui.active(), Some(LedColor::Green));
            assert_eq!(lit(&probes), vec![LedColor::Green]);
            assert_eq!(pool.in_use(), 0);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_off_keeps_led_recorded() {
        run_local(async {
            let inbox = leak_inbox();
            let (leds, probes) = leak_leds();
            let pool = leak_pool();
            let mut ui = UiActiveObject::new(
                inbox,
                leds,
                pool,
                LocalLauncher::new(),
                TokioTime::new(),
                UiConfig::default(),
            );

            ui.on_event(UiEvent::Pulse);
            settle(10).await;
            assert_eq!(lit(&probes), vec![LedColor::Red]);

            // Hold expires while no OFF request can be allocated.
            let held = hold_all(pool);
            ui.step().await;
            assert_eq!(ui.active(), Some(LedColor::Red));
            assert_eq!(lit(&probes), vec![LedColor::Red]);

            // Blue is not lit next to red.
            ui.on_event(UiEvent::Long);
            settle(10).await;
            assert_eq!(ui.active(), Some(LedColor::Red));
            assert_eq!(lit(&probes), vec![LedColor::Red]);

            // The release is retried once blocks are back.
            drop(held);
            let start = tokio::time::Instant::now();
            ui.step().await;
            assert!(start.elapsed() <= Duration::from_millis(u64::from(RELEASE_RETRY_MS)));
            assert_eq!(ui.active(), None);
            settle(10).await;
            assert!(lit(&probes).is_empty());

            ui.on_event(UiEvent::Long);
            settle(10).await;
            assert_eq!(ui.active(), Some(LedColor::Blue));
            assert_eq!(lit(&probes), vec![LedColor::Blue]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_deadline_survives_reentry() {
        run_local(async {
            let inbox = leak_inbox();
            let (leds, probes) = leak_leds();
            let mut ui = UiActiveObject::new(
                inbox,
                leds,
                leak_pool(),
                LocalLauncher::new(),
                TokioTime::new(),
                UiConfig::default(),
            );

            ui.on_event(UiEvent::Pulse);
            settle(10).await;

            // A step abandoned part way, as after a mailbox lock timeout.
            let _ = tokio::time::timeout(Duration::from_millis(600), ui.step()).await;
            assert_eq!(ui.active(), Some(LedColor::Red));

            let start = tokio::time::Instant::now();
            ui.step().await;
            assert!(start.elapsed() <= Duration::from_millis(400));
            assert_eq!(ui.active(), None);
            settle(10).await;
            assert!(lit(&probes).is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_completion_sees_every_request() {
        thread_local! {
            static DONE: RefCell<Vec<(MessageId, Status)>> = const { RefCell::new(Vec::new()) };
        }

        fn record(id: MessageId, status: Status) {
            DONE.with(|d| d.borrow_mut().push((id, status)));
        }

        run_local(async {
            let (leds, _probes) = leak_leds();
            let mut ui = UiActiveObject::new(
                leak_inbox(),
                leds,
                leak_pool(),
                LocalLauncher::new(),
                TokioTime::new(),
                UiConfig::default(),
            )
            .with_completion(record);

            ui.on_event(UiEvent::Short);
            ui.on_event(UiEvent::Long);
            settle(10).await;

            // Green's OFF and blue's ON run on different tasks.
            let mut done = DONE.with(|d| d.borrow().clone());
            done.sort_by_key(|(id, _)| *id);
            assert_eq!(done, vec![(1, Status::Ok), (2, Status::Ok), (3, Status::Ok)]);
        })
        .await;
    }
}

//! Active Object runtime
//!
//! An active object (AO) exclusively owns one resource. Requests reach it
//! through a bounded mailbox and are executed one at a time by a serving task,
//! so at most one action is ever in flight per resource.
//!
//! The serving task is started lazily and retires after an idle period. The
//! AO handle is the only authority over that lifecycle:
//!
//! ```text
//!            send()                 serve() begins
//!   Idle ───────────────► Starting ───────────────► Active
//!    ▲                                               │  ▲
//!    │ mailbox still empty         idle timeout      │  │ request found /
//!    └──────────────────────────── Draining ◄────────┘  │ send() revives
//!                                     └─────────────────┘
//! ```
//!
//! Requests are pooled blocks ([`Pooled`]) carrying a completion callback.
//! Completion consumes the block: storage goes back to the pool first, then
//! the callback runs with the request id and [`Status`]. A request therefore
//! cannot be read after its callback fired, nor released twice.

use crate::core::pool::PoolBox;
use crate::core::traits::{CriticalState, SharedState, TimeSource};
use core::fmt;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::mutex::Mutex;

/// Request identifier chosen by the producer.
pub type MessageId = u32;

/// Completion callback, invoked exactly once per request.
pub type Completion = fn(MessageId, Status);

/// Outcome of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Ok,
    /// Parameters out of range for the action
    InvalidParams,
    /// Action code not understood by the handler
    InvalidAction,
    /// The owned resource reported an I/O failure
    HardwareError,
}

/// A request to an active object.
pub struct Request<P> {
    pub id: MessageId,
    pub payload: P,
    callback: Completion,
}

impl<P> Request<P> {
    pub const fn new(id: MessageId, payload: P, callback: Completion) -> Self {
        Self {
            id,
            payload,
            callback,
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for Request<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish()
    }
}

/// A request living in a static pool block.
pub type Pooled<P> = PoolBox<'static, Request<P>>;

/// Release the request's block, then report `status` to its producer.
fn complete<P>(request: Pooled<P>, status: Status) {
    let id = request.id;
    let callback = request.callback;
    drop(request);
    callback(id, status);
}

/// Lifecycle of the serving task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lifecycle {
    /// No serving task exists
    Idle,
    /// Launch requested, task not yet running
    Starting,
    /// Task running and accepting requests
    Active,
    /// Task saw an idle timeout and is about to retire
    Draining,
}

/// Resource-specific behaviour of an active object.
#[allow(async_fn_in_trait)]
pub trait Handler {
    type Payload;

    /// Execute one request against the owned resource.
    async fn handle(&mut self, payload: &Self::Payload) -> Status;
}

/// Spawns the serving task of an active object.
///
/// On target this wraps an executor spawner; host tests spawn onto a local set.
pub trait Launch<A: ?Sized> {
    fn launch(&self, ao: &'static A) -> Result<(), LaunchError>;
}

impl<A: ?Sized, L: Launch<A>> Launch<A> for &L {
    fn launch(&self, ao: &'static A) -> Result<(), LaunchError> {
        (**self).launch(ao)
    }
}

/// Task creation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LaunchError {
    /// No free task slot
    Busy,
    /// Executor refused the task
    Failed,
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::Busy => write!(f, "no free task slot"),
            LaunchError::Failed => write!(f, "task launch failed"),
        }
    }
}

/// Failure of [`ActiveObject::send`].
#[derive(Debug)]
pub enum AoSendError<T> {
    /// Mailbox full; the request comes back to the caller
    MailboxFull(T),
    /// The serving task could not be started. The request was taken back
    /// out of the mailbox and is returned so its block can be released.
    Launch(LaunchError, T),
}

impl<T> fmt::Display for AoSendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AoSendError::MailboxFull(_) => write!(f, "active object mailbox full"),
            AoSendError::Launch(e, _) => write!(f, "{}", e),
        }
    }
}

/// One resource owner with an `N`-deep mailbox.
pub struct ActiveObject<H: Handler, const N: usize> {
    name: &'static str,
    mailbox: Channel<CriticalSectionRawMutex, Pooled<H::Payload>, N>,
    handler: Mutex<CriticalSectionRawMutex, H>,
    lifecycle: CriticalState<Lifecycle>,
    idle_timeout_ms: u32,
}

impl<H: Handler, const N: usize> ActiveObject<H, N> {
    /// Bind `handler` to a fresh, idle active object.
    pub const fn new(name: &'static str, handler: H, idle_timeout_ms: u32) -> Self {
        Self {
            name,
            mailbox: Channel::new(),
            handler: Mutex::new(handler),
            lifecycle: CriticalState::new(Lifecycle::Idle),
            idle_timeout_ms,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    /// Whether a serving task exists or is being started
    pub fn is_active(&self) -> bool {
        self.lifecycle() != Lifecycle::Idle
    }

    /// Requests waiting in the mailbox
    pub fn pending(&self) -> usize {
        self.mailbox.len()
    }

    /// Enqueue `request` and make sure a serving task will pick it up.
    ///
    /// Never waits: a full mailbox hands the request back. If no serving task
    /// can be started, the queued request is taken out again and handed back
    /// too, so nothing is left in a mailbox that nobody drains.
    ///
    /// Each object is expected to have a single producer; with several, the
    /// request handed back on a failed launch is the oldest stranded one.
    pub fn send<L: Launch<Self>>(
        &'static self,
        request: Pooled<H::Payload>,
        launcher: &L,
    ) -> Result<(), AoSendError<Pooled<H::Payload>>> {
        if let Err(TrySendError::Full(request)) = self.mailbox.try_send(request) {
            return Err(AoSendError::MailboxFull(request));
        }
        match self.start_if_needed(launcher) {
            Ok(_) => Ok(()),
            Err(e) => match self.mailbox.try_receive() {
                Ok(request) => Err(AoSendError::Launch(e, request)),
                // A concurrent start already picked it up.
                Err(_) => Ok(()),
            },
        }
    }

    /// Start the serving task unless one is running.
    ///
    /// Returns `true` if a task was launched by this call. A task that is
    /// draining is revived instead of launching a second one.
    pub fn start_if_needed<L: Launch<Self>>(&'static self, launcher: &L) -> Result<bool, LaunchError> {
        let must_launch = self.lifecycle.with_mut(|state| match *state {
            Lifecycle::Idle => {
                *state = Lifecycle::Starting;
                true
            }
            Lifecycle::Draining => {
                *state = Lifecycle::Active;
                false
            }
            Lifecycle::Starting | Lifecycle::Active => false,
        });
        if !must_launch {
            return Ok(false);
        }

        match launcher.launch(self) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.lifecycle.set(Lifecycle::Idle);
                crate::log_error!("{}: task launch failed: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Body of the serving task. Returns when the object retires.
    pub async fn serve<T: TimeSource>(&self, time: T) {
        let mut handler = self.handler.lock().await;
        self.lifecycle.set(Lifecycle::Active);
        crate::log_debug!("{}: started", self.name);

        loop {
            let request = match select(
                self.mailbox.receive(),
                time.sleep_ms(self.idle_timeout_ms),
            )
            .await
            {
                Either::First(request) => request,
                Either::Second(()) => match self.drain() {
                    Some(request) => request,
                    None => {
                        crate::log_debug!("{}: idle, retiring", self.name);
                        return;
                    }
                },
            };

            let status = handler.handle(&request.payload).await;
            if status != Status::Ok {
                crate::log_warn!("{}: request {} failed: {:?}", self.name, request.id, status);
            }
            complete(request, status);
        }
    }

    /// Idle timeout path. Returns a request that raced in, or `None` once the
    /// object is committed to `Idle`.
    fn drain(&self) -> Option<Pooled<H::Payload>> {
        loop {
            self.lifecycle.set(Lifecycle::Draining);
            if let Ok(request) = self.mailbox.try_receive() {
                self.lifecycle.set(Lifecycle::Active);
                return Some(request);
            }
            let retired = self.lifecycle.with_mut(|state| {
                if *state == Lifecycle::Draining {
                    *state = Lifecycle::Idle;
                    true
                } else {
                    false
                }
            });
            if retired {
                return None;
            }
            // A sender revived us between the check and the commit; look again.
        }
    }
}

// ============================================================================
// Embassy launcher
// ============================================================================

/// [`Launch`] over an Embassy spawner and a concrete task function.
///
/// ```ignore
/// #[embassy_executor::task(pool_size = 6)]
/// async fn led_task(ao: &'static LedAo) {
///     ao.serve(EmbassyTime).await
/// }
///
/// let launcher = SpawnerLauncher::new(spawner, led_task);
/// ```
#[cfg(feature = "embassy")]
pub struct SpawnerLauncher<A: 'static, S> {
    spawner: embassy_executor::Spawner,
    task: fn(&'static A) -> embassy_executor::SpawnToken<S>,
}

#[cfg(feature = "embassy")]
impl<A: 'static, S> SpawnerLauncher<A, S> {
    pub fn new(
        spawner: embassy_executor::Spawner,
        task: fn(&'static A) -> embassy_executor::SpawnToken<S>,
    ) -> Self {
        Self { spawner, task }
    }
}

#[cfg(feature = "embassy")]
impl<A: 'static, S> Launch<A> for SpawnerLauncher<A, S> {
    fn launch(&self, ao: &'static A) -> Result<(), LaunchError> {
        self.spawner
            .spawn((self.task)(ao))
            .map_err(|_| LaunchError::Busy)
    }
}

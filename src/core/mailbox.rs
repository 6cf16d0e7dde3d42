//! Bounded priority mailbox
//!
//! Three ring buffers (HIGH, MEDIUM, LOW), each behind its own async mutex,
//! all behind one coordinating gate:
//!
//! ```text
//!             gate (outer lock)
//!   ┌────────────┼─────────────┐
//!  HIGH        MEDIUM         LOW      (per-level locks)
//!  [ring]      [ring]        [ring]
//! ```
//!
//! Lock order is always gate, then level. Every lock wait is bounded by
//! `MailboxConfig::lock_timeout_ms`; an expired wait makes the operation fail
//! instead of blocking, so one stalled level cannot starve the others.
//!
//! Receive order is strict priority, FIFO inside a level. The timestamp is
//! recorded for diagnostics only and never reorders messages.

use crate::config::{MailboxConfig, OverflowPolicy};
use crate::core::ring_buffer::RingBuffer;
use crate::core::traits::TimeSource;
use core::fmt;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;

/// Message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Levels in receive order.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    const fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

/// Envelope stored in the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxMessage<M> {
    pub priority: Priority,
    /// Enqueue time in milliseconds, informational only
    pub timestamp_ms: u64,
    pub payload: M,
}

/// Receive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MailboxError {
    /// All levels were empty
    Empty,
    /// A lock could not be acquired within the configured bound
    LockTimeout,
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailboxError::Empty => write!(f, "mailbox empty"),
            MailboxError::LockTimeout => write!(f, "mailbox lock timeout"),
        }
    }
}

/// Send failure. Ownership of the payload goes back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum SendError<M> {
    /// Target level full under [`OverflowPolicy::Reject`]
    Full(M),
    /// A lock could not be acquired within the configured bound
    LockTimeout(M),
}

impl<M> SendError<M> {
    /// Recover the rejected payload.
    pub fn into_inner(self) -> M {
        match self {
            SendError::Full(m) | SendError::LockTimeout(m) => m,
        }
    }
}

impl<M> fmt::Display for SendError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Full(_) => write!(f, "mailbox level full"),
            SendError::LockTimeout(_) => write!(f, "mailbox lock timeout"),
        }
    }
}

struct Level<M, const N: usize> {
    ring: RingBuffer<MailboxMessage<M>, N>,
    evicted: u32,
    rejected: u32,
}

impl<M, const N: usize> Level<M, N> {
    const fn new() -> Self {
        Self {
            ring: RingBuffer::new(),
            evicted: 0,
            rejected: 0,
        }
    }
}

/// Per-level overflow counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LevelStats {
    pub evicted: u32,
    pub rejected: u32,
}

type Lock<T> = Mutex<CriticalSectionRawMutex, T>;

/// Three-level bounded mailbox with `N` slots per level (power of two).
pub struct PriorityMailbox<M, T, const N: usize> {
    gate: Lock<()>,
    levels: [Lock<Level<M, N>>; 3],
    ready: Signal<CriticalSectionRawMutex, ()>,
    config: MailboxConfig,
    time: T,
}

impl<M, T: TimeSource, const N: usize> PriorityMailbox<M, T, N> {
    pub const fn new(time: T, config: MailboxConfig) -> Self {
        Self {
            gate: Mutex::new(()),
            levels: [
                Mutex::new(Level::new()),
                Mutex::new(Level::new()),
                Mutex::new(Level::new()),
            ],
            ready: Signal::new(),
            config,
            time,
        }
    }

    /// Enqueue `payload` at `priority`.
    ///
    /// A full level either drops its oldest entry or rejects the send,
    /// depending on [`OverflowPolicy`].
    pub async fn send(&self, priority: Priority, payload: M) -> Result<(), SendError<M>> {
        let Some(gate) = self.lock_bounded(&self.gate).await else {
            return Err(SendError::LockTimeout(payload));
        };
        let Some(mut level) = self.lock_bounded(&self.levels[priority.index()]).await else {
            return Err(SendError::LockTimeout(payload));
        };

        if level.ring.is_full() && self.config.overflow == OverflowPolicy::Reject {
            level.rejected = level.rejected.saturating_add(1);
            return Err(SendError::Full(payload));
        }

        let message = MailboxMessage {
            priority,
            timestamp_ms: self.time.now_ms(),
            payload,
        };
        if level.ring.write(message).is_some() {
            level.evicted = level.evicted.saturating_add(1);
        }

        drop(level);
        drop(gate);
        self.ready.signal(());
        Ok(())
    }

    /// Dequeue the highest-priority message without waiting for one.
    ///
    /// A level whose lock cannot be taken in time is skipped; if nothing was
    /// found and some level was skipped the result is `LockTimeout`, not `Empty`.
    pub async fn receive(&self) -> Result<MailboxMessage<M>, MailboxError> {
        let Some(_gate) = self.lock_bounded(&self.gate).await else {
            return Err(MailboxError::LockTimeout);
        };

        let mut skipped = false;
        for level in &self.levels {
            match self.lock_bounded(level).await {
                Some(mut level) => {
                    if let Some(message) = level.ring.read() {
                        return Ok(message);
                    }
                }
                None => skipped = true,
            }
        }

        if skipped {
            Err(MailboxError::LockTimeout)
        } else {
            Err(MailboxError::Empty)
        }
    }

    /// Dequeue the highest-priority message, waiting until one arrives.
    ///
    /// Only lock timeouts are reported. Intended for the single consumer.
    pub async fn recv(&self) -> Result<MailboxMessage<M>, MailboxError> {
        loop {
            match self.receive().await {
                Err(MailboxError::Empty) => self.ready.wait().await,
                other => return other,
            }
        }
    }

    /// All levels empty. Approximate: levels are sampled one at a time and a
    /// level that is locked right now counts as non-empty.
    pub fn is_empty(&self) -> bool {
        self.levels
            .iter()
            .all(|level| level.try_lock().map(|l| l.ring.is_empty()).unwrap_or(false))
    }

    /// Any level full. Approximate in the same way as [`is_empty`](Self::is_empty).
    pub fn is_full(&self) -> bool {
        self.levels
            .iter()
            .any(|level| level.try_lock().map(|l| l.ring.is_full()).unwrap_or(false))
    }

    /// Entries queued at `priority`, or `None` while that level is locked.
    pub fn len(&self, priority: Priority) -> Option<usize> {
        self.levels[priority.index()]
            .try_lock()
            .ok()
            .map(|l| l.ring.len())
    }

    /// Overflow counters for `priority`, or `None` while that level is locked.
    pub fn stats(&self, priority: Priority) -> Option<LevelStats> {
        self.levels[priority.index()].try_lock().ok().map(|l| LevelStats {
            evicted: l.evicted,
            rejected: l.rejected,
        })
    }

    pub const fn capacity_per_level(&self) -> usize {
        N
    }

    async fn lock_bounded<'a, X>(
        &self,
        lock: &'a Lock<X>,
    ) -> Option<MutexGuard<'a, CriticalSectionRawMutex, X>> {
        if let Ok(guard) = lock.try_lock() {
            return Some(guard);
        }
        match select(lock.lock(), self.time.sleep_ms(self.config.lock_timeout_ms)).await {
            Either::First(guard) => Some(guard),
            Either::Second(()) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TokioTime;

    type Mailbox<const N: usize> = PriorityMailbox<&'static str, TokioTime, N>;

    fn mailbox<const N: usize>(overflow: OverflowPolicy) -> Mailbox<N> {
        PriorityMailbox::new(
            TokioTime::new(),
            MailboxConfig {
                overflow,
                ..MailboxConfig::default()
            },
        )
    }

    async fn drain<const N: usize>(mb: &Mailbox<N>) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Ok(msg) = mb.receive().await {
            out.push(msg.payload);
        }
        out
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_strict_priority_regardless_of_send_order() {
        let mb: Mailbox<4> = mailbox(OverflowPolicy::EvictOldest);
        mb.send(Priority::Low, "low").await.unwrap();
        mb.send(Priority::High, "high").await.unwrap();
        mb.send(Priority::Medium, "medium").await.unwrap();

        assert_eq!(drain(&mb).await, vec!["high", "medium", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_within_level() {
        let mb: Mailbox<4> = mailbox(OverflowPolicy::EvictOldest);
        mb.send(Priority::Medium, "a").await.unwrap();
        mb.send(Priority::Medium, "b").await.unwrap();

        assert_eq!(mb.receive().await.unwrap().payload, "a");
        assert_eq!(mb.receive().await.unwrap().payload, "b");
        assert_eq!(mb.receive().await, Err(MailboxError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamp_is_recorded_but_not_used_for_ordering() {
        let mb: Mailbox<4> = mailbox(OverflowPolicy::EvictOldest);
        mb.send(Priority::Low, "early").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        mb.send(Priority::Low, "late").await.unwrap();

        let first = mb.receive().await.unwrap();
        let second = mb.receive().await.unwrap();
        assert_eq!(first.payload, "early");
        assert_eq!(first.priority, Priority::Low);
        assert!(second.timestamp_ms >= first.timestamp_ms + 10);
    }

    // ========================================================================
    // Overflow policy
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_evict_oldest_when_level_full() {
        let mb: Mailbox<2> = mailbox(OverflowPolicy::EvictOldest);
        for payload in ["a", "b", "c"] {
            mb.send(Priority::High, payload).await.unwrap();
        }
        mb.send(Priority::Low, "low").await.unwrap();

        assert_eq!(mb.stats(Priority::High).unwrap().evicted, 1);
        assert_eq!(drain(&mb).await, vec!["b", "c", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_when_level_full() {
        let mb: Mailbox<2> = mailbox(OverflowPolicy::Reject);
        mb.send(Priority::High, "a").await.unwrap();
        mb.send(Priority::High, "b").await.unwrap();

        let err = mb.send(Priority::High, "c").await.unwrap_err();
        assert_eq!(err, SendError::Full("c"));
        assert_eq!(err.into_inner(), "c");

        // Other levels still accept.
        mb.send(Priority::Medium, "m").await.unwrap();
        assert_eq!(mb.stats(Priority::High).unwrap().rejected, 1);
        assert_eq!(drain(&mb).await, vec!["a", "b", "m"]);
    }

    // ========================================================================
    // Lock bounds
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_send_fails_when_level_lock_held() {
        let mb: Mailbox<4> = mailbox(OverflowPolicy::EvictOldest);
        let _held = mb.levels[Priority::High.index()].lock().await;

        let start = tokio::time::Instant::now();
        let result = mb.send(Priority::High, "x").await;
        assert_eq!(result, Err(SendError::LockTimeout("x")));
        assert!(start.elapsed() >= std::time::Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_skips_locked_level() {
        let mb: Mailbox<4> = mailbox(OverflowPolicy::EvictOldest);
        mb.send(Priority::Medium, "medium").await.unwrap();
        let held = mb.levels[Priority::High.index()].lock().await;

        assert_eq!(mb.receive().await.unwrap().payload, "medium");
        assert_eq!(mb.receive().await, Err(MailboxError::LockTimeout));

        drop(held);
        assert_eq!(mb.receive().await, Err(MailboxError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_timeout_fails_both_directions() {
        let mb: Mailbox<4> = mailbox(OverflowPolicy::EvictOldest);
        let _gate = mb.gate.lock().await;

        assert_eq!(
            mb.send(Priority::Low, "x").await,
            Err(SendError::LockTimeout("x"))
        );
        assert_eq!(mb.receive().await, Err(MailboxError::LockTimeout));
    }

    // ========================================================================
    // Blocking receive and queries
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_recv_waits_for_send() {
        let mb: &'static Mailbox<4> =
            Box::leak(Box::new(mailbox(OverflowPolicy::EvictOldest)));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let consumer = tokio::task::spawn_local(async move { mb.recv().await });
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                assert!(!consumer.is_finished());

                mb.send(Priority::Low, "wake").await.unwrap();
                let msg = consumer.await.unwrap().unwrap();
                assert_eq!(msg.payload, "wake");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_full_and_len() {
        let mb: Mailbox<2> = mailbox(OverflowPolicy::EvictOldest);
        assert!(mb.is_empty());
        assert!(!mb.is_full());

        mb.send(Priority::Low, "a").await.unwrap();
        assert!(!mb.is_empty());
        assert!(!mb.is_full());
        assert_eq!(mb.len(Priority::Low), Some(1));

        mb.send(Priority::Low, "b").await.unwrap();
        assert!(mb.is_full());
        assert_eq!(mb.len(Priority::High), Some(0));
        assert_eq!(mb.capacity_per_level(), 2);
    }
}

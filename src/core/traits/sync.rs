//! Synchronized state abstraction for interrupt-safe state access.
//!
//! Every piece of state shared between tasks and the DMA interrupt that is not
//! an async primitive (pool bitmap, active object lifecycle, logger subscriber
//! table, counters) lives behind a [`CriticalState`]. Closures passed to it run
//! inside a critical section and must stay short and non-blocking.

use core::cell::RefCell;
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

/// Platform-agnostic synchronized state access.
///
/// # Example
///
/// ```
/// use ao_firmware::core::traits::{CriticalState, SharedState};
///
/// struct Counter {
///     value: u32,
/// }
///
/// fn increment<S: SharedState<Counter>>(state: &S) -> u32 {
///     state.with_mut(|counter| {
///         counter.value += 1;
///         counter.value
///     })
/// }
///
/// let counter = CriticalState::new(Counter { value: 0 });
/// assert_eq!(increment(&counter), 1);
/// ```
pub trait SharedState<T> {
    /// Access state immutably.
    fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R;

    /// Access state mutably.
    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R;
}

/// Critical-section protected state.
///
/// Uses Embassy's blocking mutex over `CriticalSectionRawMutex`, so access is
/// safe from async tasks and interrupt handlers alike. On the host the
/// `critical-section` std implementation backs it with a global lock.
pub struct CriticalState<T> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<T>>,
}

impl<T> CriticalState<T> {
    /// Creates a new `CriticalState` wrapping the given value.
    ///
    /// This is a const fn, allowing static initialization.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }
}

impl<T: Copy> CriticalState<T> {
    /// Copy the current value out.
    pub fn get(&self) -> T {
        self.with(|v| *v)
    }

    /// Overwrite the current value.
    pub fn set(&self, value: T) {
        self.with_mut(|v| *v = value)
    }
}

impl<T> SharedState<T> for CriticalState<T> {
    fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.inner.lock(|cell| f(&cell.borrow()))
    }

    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl<T: Default> Default for CriticalState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

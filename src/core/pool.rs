//! Fixed-block memory pool
//!
//! Hands out `N` equally sized blocks of `T` from static storage, no heap.
//! An allocation is a [`PoolBox`]: an owned handle that moves from producer to
//! consumer and returns its block to the pool when dropped. Because the handle
//! is moved rather than copied, a block cannot be released twice and cannot be
//! read after release.
//!
//! The free map is a `u32` bitmask behind a critical section, so `N <= 32`.

use crate::core::traits::{CriticalState, SharedState};
use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

/// Allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolStats {
    /// Blocks handed out since creation
    pub acquired: u32,
    /// Blocks returned since creation
    pub released: u32,
    /// Allocation attempts that found the pool exhausted
    pub exhausted: u32,
}

#[derive(Clone, Copy)]
struct PoolState {
    in_use: u32,
    stats: PoolStats,
}

/// Pool of `N` blocks of `T`.
pub struct MemoryPool<T, const N: usize> {
    slots: [UnsafeCell<MaybeUninit<T>>; N],
    state: CriticalState<PoolState>,
}

// SAFETY: a slot is only reachable through the single `PoolBox` that owns its
// bit in `in_use`, and bits are flipped inside a critical section. Values of
// `T` move between contexts inside a `PoolBox`, hence `T: Send`.
unsafe impl<T: Send, const N: usize> Sync for MemoryPool<T, N> {}

impl<T, const N: usize> MemoryPool<T, N> {
    const CAPACITY_OK: () = assert!(N > 0 && N <= 32, "pool supports 1..=32 blocks");

    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            slots: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
            state: CriticalState::new(PoolState {
                in_use: 0,
                stats: PoolStats {
                    acquired: 0,
                    released: 0,
                    exhausted: 0,
                },
            }),
        }
    }

    /// Move `value` into a free block.
    ///
    /// Hands `value` back when every block is in use.
    pub fn alloc(&self, value: T) -> Result<PoolBox<'_, T>, T> {
        let index = self.state.with_mut(|s| {
            let free = !s.in_use & Self::mask();
            if free == 0 {
                s.stats.exhausted = s.stats.exhausted.saturating_add(1);
                return None;
            }
            let index = free.trailing_zeros() as usize;
            s.in_use |= 1 << index;
            s.stats.acquired = s.stats.acquired.wrapping_add(1);
            Some(index)
        });

        let Some(index) = index else {
            return Err(value);
        };

        // SAFETY: the bit for `index` was free and is now owned by this call,
        // so nothing else aliases the slot.
        let ptr = unsafe {
            let slot = &mut *self.slots[index].get();
            NonNull::from(slot.write(value))
        };

        Ok(PoolBox {
            ptr,
            index: index as u8,
            state: &self.state,
        })
    }

    /// Number of free blocks.
    pub fn available(&self) -> usize {
        N - self.in_use()
    }

    /// Number of blocks currently handed out.
    pub fn in_use(&self) -> usize {
        self.state.with(|s| s.in_use.count_ones() as usize)
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn stats(&self) -> PoolStats {
        self.state.with(|s| s.stats)
    }

    const fn mask() -> u32 {
        if N == 32 {
            u32::MAX
        } else {
            (1u32 << N) - 1
        }
    }
}

impl<T, const N: usize> Default for MemoryPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned handle to one pool block.
///
/// Dropping the handle drops the value and returns the block.
pub struct PoolBox<'p, T> {
    ptr: NonNull<T>,
    index: u8,
    state: &'p CriticalState<PoolState>,
}

// SAFETY: `PoolBox` is a unique owner of its `T`, like `Box<T>`.
unsafe impl<T: Send> Send for PoolBox<'_, T> {}
// SAFETY: shared access only yields `&T`.
unsafe impl<T: Sync> Sync for PoolBox<'_, T> {}

impl<T> Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the block is initialized and exclusively owned by this handle.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`, plus `&mut self` guarantees uniqueness.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the value was written in `alloc` and is dropped exactly once here.
        unsafe { core::ptr::drop_in_place(self.ptr.as_ptr()) };
        let bit = 1u32 << self.index;
        self.state.with_mut(|s| {
            debug_assert!(s.in_use & bit != 0, "pool block released twice");
            s.in_use &= !bit;
            s.stats.released = s.stats.released.wrapping_add(1);
        });
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBox")
            .field("block", &self.index)
            .field("value", &**self)
            .finish()
    }
}

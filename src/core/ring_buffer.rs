//! Fixed-capacity ring buffer
//!
//! Bounded, lossy FIFO: writing into a full buffer drops the oldest item.
//! Capacity must be a power of two so index wrap is a mask instead of a
//! division; this is checked at compile time.
//!
//! The buffer does no locking of its own. The priority mailbox wraps each
//! level in a mutex; byte users own their buffer outright.
//!
//! ```text
//!        tail            head
//!         v               v
//! [ . . . A B C D E . . . . ]   size = (head - tail) & MASK
//! ```

/// Fixed-capacity circular buffer with drop-oldest overflow.
pub struct RingBuffer<T, const N: usize> {
    slots: [Option<T>; N],
    head: usize,
    tail: usize,
    full: bool,
}

impl<T, const N: usize> RingBuffer<T, N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "ring buffer capacity must be a power of two");
        N - 1
    };

    /// Create an empty buffer.
    pub const fn new() -> Self {
        // Force evaluation of the capacity check for every instantiation.
        let _ = Self::MASK;
        Self {
            slots: [const { None }; N],
            head: 0,
            tail: 0,
            full: false,
        }
    }

    /// Append `item`, returning the evicted oldest item when the buffer was full.
    pub fn write(&mut self, item: T) -> Option<T> {
        let evicted = if self.full {
            self.tail = (self.tail + 1) & Self::MASK;
            self.slots[self.head].take()
        } else {
            None
        };
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) & Self::MASK;
        self.full = self.head == self.tail;
        evicted
    }

    /// Remove and return the oldest item.
    pub fn read(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.tail].take();
        self.tail = (self.tail + 1) & Self::MASK;
        self.full = false;
        item
    }

    /// Oldest item without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            self.slots[self.tail].as_ref()
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        if self.full {
            N
        } else {
            self.head.wrapping_sub(self.tail) & Self::MASK
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop every stored item and rewind to the empty state.
    pub fn clear(&mut self) {
        while self.read().is_some() {}
        self.head = 0;
        self.tail = 0;
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Rewind to the empty state without touching slot storage.
    ///
    /// Stale `Copy` items stay in memory until overwritten.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.full = false;
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Byte helpers
// ============================================================================

impl<const N: usize> RingBuffer<u8, N> {
    /// Write every byte of `data`, dropping the oldest bytes on overflow.
    ///
    /// Returns the number of bytes that were evicted to make room.
    pub fn write_slice(&mut self, data: &[u8]) -> usize {
        data.iter()
            .filter(|&&b| self.write(b).is_some())
            .count()
    }

    /// Read up to `out.len()` bytes, oldest first. Returns the count read.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        for slot in out.iter_mut() {
            match self.read() {
                Some(b) => {
                    *slot = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Write a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.write_slice(&value.to_le_bytes());
    }

    /// Read a little-endian `u16`, or `None` if fewer than two bytes are stored.
    pub fn read_u16(&mut self) -> Option<u16> {
        if self.len() < 2 {
            return None;
        }
        let mut bytes = [0u8; 2];
        self.read_into(&mut bytes);
        Some(u16::from_le_bytes(bytes))
    }
}

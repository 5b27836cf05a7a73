//! Racy-but-Safe Hit Counters (Muda Elimination)
//!
//! Instrumented code increments counters from any number of application
//! threads with no synchronization. Each increment is a relaxed load followed
//! by a relaxed store: memory stays valid, nothing blocks, and concurrent
//! increments of the same slot may be lost. Coverage needs "was it hit", not
//! an exact count, so the under-count is acceptable.
//!
//! Counter storage is sized once, when a branch or switch is registered, and
//! never resized while touches may be running.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A single hit counter
///
/// Shared access (`&self`) only supports the racy [`HitCounter::increment`];
/// exact arithmetic needs `&mut self` and happens after execution quiesced.
#[derive(Default)]
pub struct HitCounter(AtomicU32);

impl HitCounter {
    /// Create a counter with an initial value
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(AtomicU32::new(value))
    }

    /// Record one hit (hot path)
    ///
    /// Not a read-modify-write instruction: two threads racing on the same
    /// counter can both read `n` and both store `n + 1`.
    #[inline(always)]
    pub fn increment(&self) {
        let current = self.0.load(Ordering::Relaxed);
        self.0.store(current.wrapping_add(1), Ordering::Relaxed);
    }

    /// Current value
    #[inline]
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Add `count` hits exactly
    #[inline]
    pub fn add(&mut self, count: u32) {
        let value = self.0.get_mut();
        *value = value.wrapping_add(count);
    }

    /// Overwrite the value
    #[inline]
    pub fn set(&mut self, value: u32) {
        *self.0.get_mut() = value;
    }

    /// Check if the counter was ever hit
    #[inline]
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.get() > 0
    }
}

impl Clone for HitCounter {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl PartialEq for HitCounter {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for HitCounter {}

impl fmt::Debug for HitCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl From<u32> for HitCounter {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// Fixed-size array of hit counters
///
/// Used for switch arms and the sampling-mode line mask. The length is fixed
/// at construction; out-of-range touches are ignored.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CounterArray {
    slots: Box<[HitCounter]>,
}

impl CounterArray {
    /// Create `len` zeroed counters
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| HitCounter::default()).collect(),
        }
    }

    /// Create counters holding the given values
    #[must_use]
    pub fn from_values(values: &[u32]) -> Self {
        Self {
            slots: values.iter().copied().map(HitCounter::new).collect(),
        }
    }

    /// Record one hit on slot `idx` (hot path)
    #[inline(always)]
    pub fn increment(&self, idx: usize) {
        if let Some(slot) = self.slots.get(idx) {
            slot.increment();
        }
    }

    /// Value of slot `idx`, or 0 when out of range
    #[inline]
    #[must_use]
    pub fn get(&self, idx: usize) -> u32 {
        self.slots.get(idx).map_or(0, HitCounter::get)
    }

    /// Add `count` hits to slot `idx` exactly
    pub fn add(&mut self, idx: usize, count: u32) {
        if let Some(slot) = self.slots.get_mut(idx) {
            slot.add(count);
        }
    }

    /// Add every slot of `other` into the matching slot of `self`
    ///
    /// Callers check that lengths match first.
    pub fn add_all(&mut self, other: &CounterArray) {
        for (slot, theirs) in self.slots.iter_mut().zip(other.slots.iter()) {
            slot.add(theirs.get());
        }
    }

    /// Number of slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no slots
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of all values
    #[must_use]
    pub fn values(&self) -> Vec<u32> {
        self.slots.iter().map(HitCounter::get).collect()
    }

    /// Check if every slot was hit at least once
    #[must_use]
    pub fn all_hit(&self) -> bool {
        self.slots.iter().all(HitCounter::is_hit)
    }

    /// Check if any slot was hit
    #[must_use]
    pub fn any_hit(&self) -> bool {
        self.slots.iter().any(HitCounter::is_hit)
    }
}

impl fmt::Debug for CounterArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}

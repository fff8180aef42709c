//! Fixed-type object pools for order and price-level records.
//!
//! The hot path of the book allocates and retires records constantly; the
//! pool keeps them in one dense slot vector with a free list so that no
//! per-order heap allocation happens after warm-up. Records are addressed by
//! generation-checked handles instead of pointers: retiring a record bumps
//! its slot generation, so a stale handle can never resolve to a recycled
//! record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Generation-checked reference to a pooled record.
///
/// A handle is only meaningful to the pool that issued it; resolving it
/// through any other pool yields `None` or an unrelated record of the same
/// type, never undefined behavior.
#[derive(Debug, Serialize, Deserialize)]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    live: bool,
    value: T,
}

/// Pool usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Slots ever created (the pool never shrinks)
    pub total_allocated: usize,
    /// Records currently live
    pub current_usage: usize,
    /// High-water mark of live records
    pub peak_usage: usize,
    /// Cumulative allocate() calls
    pub allocation_count: usize,
    /// Slots currently on the free list
    pub free_count: usize,
}

/// Dense-slot object pool with free-list reclamation.
///
/// The pool is owned by exactly one book and lives inside that book's
/// mutex-guarded state; the owning lock serializes every operation here.
/// Slot storage only grows, and growth appends slots without relocating the
/// identity of live handles.
pub struct ObjectPool<T: Default> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    peak: usize,
    allocations: usize,
}

impl<T: Default> ObjectPool<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
            peak: 0,
            allocations: 0,
        }
    }

    /// Take a record from the pool. Contents are whatever the slot last
    /// held; the caller initializes every field it reads.
    pub fn allocate(&mut self) -> Handle<T> {
        self.allocations += 1;
        self.live += 1;
        self.peak = self.peak.max(self.live);

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.live = true;
            return Handle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            live: true,
            value: T::default(),
        });
        Handle::new(index, 1)
    }

    /// Return a record to the free list. The slot generation advances, so
    /// `handle` (and any copy of it) stops resolving. Returns false for a
    /// stale or foreign handle.
    pub fn deallocate(&mut self, handle: Handle<T>) -> bool {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.live && slot.generation == handle.generation => {
                slot.live = false;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(handle.index);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.live && slot.generation == handle.generation)
            .map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.live && slot.generation == handle.generation)
            .map(|slot| &mut slot.value)
    }

    /// Mark every slot free and invalidate all outstanding handles.
    pub fn reset(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.live {
                slot.live = false;
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }
        self.live = 0;
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_allocated: self.slots.len(),
            current_usage: self.live,
            peak_usage: self.peak,
            allocation_count: self.allocations,
            free_count: self.free.len(),
        }
    }
}

impl<T: Default> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Record {
        value: u64,
    }

    #[test]
    fn test_allocate_and_access() {
        let mut pool = ObjectPool::<Record>::new();
        let h = pool.allocate();
        pool.get_mut(h).unwrap().value = 42;

        assert_eq!(pool.get(h).unwrap().value, 42);
        assert_eq!(pool.stats().current_usage, 1);
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut pool = ObjectPool::<Record>::new();
        let h = pool.allocate();
        assert!(pool.deallocate(h));

        assert!(pool.get(h).is_none());
        assert!(!pool.deallocate(h));

        // The slot is recycled under a new generation
        let h2 = pool.allocate();
        assert!(pool.get(h2).is_some());
        assert!(pool.get(h).is_none());
    }

    #[test]
    fn test_free_list_reuse() {
        let mut pool = ObjectPool::<Record>::new();
        let handles: Vec<_> = (0..10).map(|_| pool.allocate()).collect();
        for h in &handles {
            pool.deallocate(*h);
        }

        let stats = pool.stats();
        assert_eq!(stats.total_allocated, 10);
        assert_eq!(stats.current_usage, 0);
        assert_eq!(stats.free_count, 10);

        // Reallocation drains the free list instead of growing
        for _ in 0..10 {
            pool.allocate();
        }
        let stats = pool.stats();
        assert_eq!(stats.total_allocated, 10);
        assert_eq!(stats.current_usage, 10);
        assert_eq!(stats.free_count, 0);
        assert_eq!(stats.allocation_count, 20);
    }

    #[test]
    fn test_peak_usage() {
        let mut pool = ObjectPool::<Record>::new();
        let handles: Vec<_> = (0..5).map(|_| pool.allocate()).collect();
        for h in handles {
            pool.deallocate(h);
        }
        pool.allocate();

        assert_eq!(pool.stats().peak_usage, 5);
    }

    #[test]
    fn test_reset() {
        let mut pool = ObjectPool::<Record>::new();
        let h = pool.allocate();
        pool.allocate();
        pool.reset();

        assert!(pool.get(h).is_none());
        let stats = pool.stats();
        assert_eq!(stats.current_usage, 0);
        assert_eq!(stats.free_count, 2);
    }
}

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-capacity output buffer with an atomic write cursor.
///
/// Any number of workers may [`push`](FixedArena::push) concurrently; each push claims the next
/// slot with a single `fetch_add`. Claims past the capacity are dropped, so the entries that land
/// are exactly the lowest-claimed ones. The cursor keeps counting past the capacity so the number
/// of dropped entries stays observable. The buffer never grows.
///
/// Reading requires exclusive access, which guarantees that every write of the stage has finished.
pub struct FixedArena<T> {
    slots: Box<[UnsafeCell<T>]>,
    cursor: CachePadded<AtomicUsize>,
}

// SAFETY: each slot index is handed out exactly once per reset by the atomic cursor, so no two
// threads ever write the same slot. Reads go through `&mut self`.
unsafe impl<T: Send> Sync for FixedArena<T> {}

impl<T> std::fmt::Debug for FixedArena<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedArena")
            .field("capacity", &self.slots.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Copy + Default> FixedArena<T> {
    /// Creates an arena holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| UnsafeCell::new(T::default())).collect(),
            cursor: CachePadded::new(AtomicUsize::new(0)),
        }
    }
}

impl<T: Copy> FixedArena<T> {
    /// Maximum number of entries the arena retains.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claims the next slot and stores `value` in it. Returns the slot index, or `None` when the
    /// arena is full and the value was dropped.
    #[inline(always)]
    pub fn push(&self, value: T) -> Option<usize> {
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        let slot = self.slots.get(index)?;
        // SAFETY: `index` was claimed by this call alone; see the `Sync` impl.
        unsafe {
            *slot.get() = value;
        }
        Some(index)
    }

    /// Number of entries stored.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.cursor.load(Ordering::Acquire).min(self.slots.len())
    }

    /// Whether no entry has been stored since the last reset.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pushes attempted since the last reset, including dropped ones.
    #[inline(always)]
    pub fn attempted(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Number of pushes dropped because the arena was full.
    #[inline(always)]
    pub fn dropped(&self) -> usize {
        self.attempted().saturating_sub(self.slots.len())
    }

    /// Whether any push was dropped since the last reset.
    #[inline(always)]
    pub fn overflowed(&self) -> bool {
        self.dropped() > 0
    }

    /// Forgets all entries. Slot contents are left in place and get overwritten by later pushes.
    #[inline(always)]
    pub fn reset(&mut self) {
        *self.cursor.get_mut() = 0;
    }

    /// The stored entries in slot order.
    pub fn as_slice(&mut self) -> &[T] {
        let len = (*self.cursor.get_mut()).min(self.slots.len());
        // SAFETY: `UnsafeCell<T>` has the same layout as `T`, and the exclusive borrow rules out
        // concurrent pushes for the lifetime of the returned slice.
        unsafe { std::slice::from_raw_parts(self.slots.as_ptr().cast::<T>(), len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::thread_dispatcher::ThreadDispatcher;

    #[test]
    fn drops_past_capacity() {
        let mut arena = FixedArena::<u32>::with_capacity(3);
        for value in 0..5 {
            let slot = arena.push(value);
            assert_eq!(slot.is_some(), value < 3);
        }
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.dropped(), 2);
        assert!(arena.overflowed());
        assert_eq!(arena.as_slice(), &[0, 1, 2]);
        arena.reset();
        assert!(arena.is_empty());
        assert!(!arena.overflowed());
    }

    #[test]
    fn concurrent_pushes_land_in_distinct_slots() {
        let dispatcher = ThreadDispatcher::new(4);
        let mut arena = FixedArena::<usize>::with_capacity(4000);
        dispatcher.dispatch_workers(4, |worker| {
            for i in 0..1000 {
                arena.push(worker * 1000 + i);
            }
        });
        let mut values = arena.as_slice().to_vec();
        values.sort_unstable();
        assert_eq!(values, (0..4000).collect::<Vec<_>>());
    }
}

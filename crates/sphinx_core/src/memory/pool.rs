//! # Object Pool
//!
//! Fixed-capacity slot storage. Entities and every component type live in
//! one of these; nothing grows after construction.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A fixed-capacity pool of `T`.
///
/// Allocation always hands out the lowest-indexed free slot, so slot indices
/// are dense and reuse is deterministic. The pool itself is not thread-safe;
/// owners wrap it in a lock when they share it.
///
/// # Example
///
/// ```rust
/// use sphinx_core::ObjectPool;
///
/// let mut pool: ObjectPool<u32> = ObjectPool::new(4);
/// let a = pool.allocate(7).unwrap();
/// let b = pool.allocate(8).unwrap();
/// assert_eq!((a.index(), b.index()), (0, 1));
///
/// pool.release(a);
/// assert_eq!(pool.allocate(9).unwrap().index(), 0);
/// ```
pub struct ObjectPool<T> {
    storage: Box<[Option<T>]>,
    /// Min-heap of free slot indices.
    free_slots: BinaryHeap<Reverse<usize>>,
    live_count: usize,
}

/// Handle to an occupied pool slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle {
    index: usize,
}

impl PoolHandle {
    /// Handle for slot `index`.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self { index }
    }

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

/// Returned when every slot is occupied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolFull {
    /// The pool's capacity.
    pub capacity: usize,
}

impl<T> ObjectPool<T> {
    /// Creates a pool with `capacity` slots, all free.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be greater than zero");

        let storage: Vec<Option<T>> = (0..capacity).map(|_| None).collect();
        let free_slots = (0..capacity).map(Reverse).collect();

        Self {
            storage: storage.into_boxed_slice(),
            free_slots,
            live_count: 0,
        }
    }

    /// Total slot count.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// True if no slot is free.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.free_slots.is_empty()
    }

    /// Stores `value` in the lowest free slot.
    ///
    /// # Errors
    ///
    /// Returns [`PoolFull`] if every slot is occupied; `value` is dropped.
    pub fn allocate(&mut self, value: T) -> Result<PoolHandle, PoolFull> {
        self.allocate_with(|_| value)
    }

    /// Stores the value built by `init`, which receives the slot it will occupy.
    ///
    /// # Errors
    ///
    /// Returns [`PoolFull`] if every slot is occupied; `init` is not called.
    pub fn allocate_with<F>(&mut self, init: F) -> Result<PoolHandle, PoolFull>
    where
        F: FnOnce(PoolHandle) -> T,
    {
        let Some(Reverse(index)) = self.free_slots.pop() else {
            return Err(PoolFull {
                capacity: self.capacity(),
            });
        };

        let handle = PoolHandle { index };
        self.storage[index] = Some(init(handle));
        self.live_count += 1;
        Ok(handle)
    }

    /// Vacates a slot and returns its value.
    ///
    /// Returns `None` for a free or out-of-range slot.
    pub fn release(&mut self, handle: PoolHandle) -> Option<T> {
        let value = self.storage.get_mut(handle.index)?.take()?;
        self.free_slots.push(Reverse(handle.index));
        self.live_count -= 1;
        Some(value)
    }

    /// True if the slot is occupied.
    #[inline]
    #[must_use]
    pub fn is_live(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// The value in an occupied slot.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.storage.get(handle.index)?.as_ref()
    }

    /// The value in an occupied slot, mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.storage.get_mut(handle.index)?.as_mut()
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.storage
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|v| (PoolHandle { index }, v)))
    }
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("capacity", &self.capacity())
            .field("live_count", &self.live_count)
            .finish_non_exhaustive()
    }
}

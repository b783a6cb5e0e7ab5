//! # Lend/Return Pool
//!
//! Reusable scratch objects that are lent out and handed back instead of
//! being allocated and dropped on every query.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::error::{StrataError, StrataResult};

/// A scratch object that can be cleared and lent out again.
pub trait Reusable: Default + 'static {
    /// Allocates a fresh, empty object with room for `capacity` elements.
    fn with_capacity(capacity: usize) -> Self;

    /// Clears the object, keeping its allocation.
    fn reset(&mut self);

    /// Makes room for at least `capacity` elements.
    fn ensure_capacity(&mut self, capacity: usize);

    /// Name used in errors and logs.
    #[must_use]
    fn kind() -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<T: 'static> Reusable for Vec<T> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn ensure_capacity(&mut self, capacity: usize) {
        self.reserve(capacity.saturating_sub(self.len()));
    }
}

/// Small set of dense indices, used while resolving filter shapes.
pub type IndexSet = HashSet<usize>;

impl Reusable for IndexSet {
    fn with_capacity(capacity: usize) -> Self {
        HashSet::with_capacity(capacity)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn ensure_capacity(&mut self, capacity: usize) {
        self.reserve(capacity.saturating_sub(self.len()));
    }
}

/// Handle to an object lent out by a [`Pool`].
///
/// The generation makes a handle single-use: once the object is handed back,
/// the same handle is rejected.
pub struct PoolHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PoolHandle<T> {
    /// Pool slot this handle points at.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl<T> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolHandle<T> {}

impl<T> PartialEq for PoolHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for PoolHandle<T> {}

impl<T> fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

/// One resting place in the pool.
struct PoolSlot<T> {
    /// The object, while it is not on loan.
    item: Option<T>,
    /// Bumped on every return.
    generation: u32,
    /// Whether the object is currently lent out.
    lent: bool,
}

/// A lend/return pool for one reusable type.
///
/// Objects can be lent out and handed back individually. Lending reuses a
/// previously returned object when one is resting in the pool and allocates a
/// fresh one otherwise.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per world.
///
/// # Example
///
/// ```rust
/// use strata_core::memory::Pool;
///
/// let mut pool: Pool<Vec<u32>> = Pool::new(16, 20);
///
/// let (handle, mut scratch) = pool.lend(8);
/// scratch.push(1);
/// pool.give_back(handle, scratch).unwrap();
///
/// // A handle is only good for one return.
/// assert!(pool.give_back(handle, Vec::new()).is_err());
/// ```
pub struct Pool<T: Reusable> {
    /// Resting places, indexed by handle.
    slots: Vec<PoolSlot<T>>,
    /// Indices of slots whose object is resting in the pool.
    free_list: Vec<usize>,
    /// Number of objects currently lent out.
    outstanding: usize,
    /// Capacity of freshly allocated objects.
    default_capacity: usize,
    /// Outstanding count above which a leak warning is logged.
    leak_threshold: usize,
}

impl<T: Reusable> Pool<T> {
    /// Creates an empty pool.
    ///
    /// # Arguments
    ///
    /// * `default_capacity` - Capacity of freshly allocated objects
    /// * `leak_threshold` - Outstanding count above which debug builds log a warning
    #[must_use]
    pub fn new(default_capacity: usize, leak_threshold: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            outstanding: 0,
            default_capacity,
            leak_threshold,
        }
    }

    /// Returns the number of objects currently lent out.
    #[inline]
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Returns the number of objects resting in the pool.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the capacity of freshly allocated objects.
    #[inline]
    #[must_use]
    pub const fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    /// Lends out an object with room for at least `capacity` elements.
    ///
    /// The object must be handed back with [`give_back`](Self::give_back).
    pub fn lend(&mut self, capacity: usize) -> (PoolHandle<T>, T) {
        let index = if let Some(index) = self.free_list.pop() {
            index
        } else {
            self.slots.push(PoolSlot {
                item: None,
                generation: 0,
                lent: false,
            });
            self.slots.len() - 1
        };

        let slot = &mut self.slots[index];
        let mut item = slot
            .item
            .take()
            .unwrap_or_else(|| T::with_capacity(capacity.max(self.default_capacity)));
        item.ensure_capacity(capacity);
        slot.lent = true;

        self.outstanding += 1;
        if cfg!(debug_assertions) && self.outstanding == self.leak_threshold + 1 {
            tracing::warn!(
                kind = T::kind(),
                outstanding = self.outstanding,
                threshold = self.leak_threshold,
                "possible pool leak: too many outstanding leases"
            );
        }

        #[allow(clippy::cast_possible_truncation)]
        let handle = PoolHandle {
            index: index as u32,
            generation: slot.generation,
            _marker: PhantomData,
        };
        (handle, item)
    }

    /// Hands a lent object back, clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::PoolDoubleReturn`] if the handle's object is not
    /// on loan, which happens when the same handle is returned twice.
    pub fn give_back(&mut self, handle: PoolHandle<T>, mut item: T) -> StrataResult<()> {
        let double_return = StrataError::PoolDoubleReturn {
            kind: T::kind(),
            index: handle.index,
        };
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return Err(double_return);
        };
        if !slot.lent || slot.generation != handle.generation {
            return Err(double_return);
        }

        item.reset();
        slot.item = Some(item);
        slot.lent = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index as usize);
        self.outstanding -= 1;
        Ok(())
    }

    /// Lends out an object inside a guard that hands it back when dropped.
    ///
    /// The guard returns the object on every exit path, including unwinding.
    pub fn lease(&mut self, capacity: usize) -> Lease<'_, T> {
        let (handle, item) = self.lend(capacity);
        Lease {
            pool: self,
            handle,
            item,
        }
    }
}

impl<T: Reusable> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("kind", &T::kind())
            .field("slots", &self.slots.len())
            .field("available", &self.free_list.len())
            .field("outstanding", &self.outstanding)
            .field("leak_threshold", &self.leak_threshold)
            .finish_non_exhaustive()
    }
}

/// Scope guard around a lent object.
///
/// Dereferences to the object and hands it back to its pool on drop.
pub struct Lease<'p, T: Reusable> {
    pool: &'p mut Pool<T>,
    handle: PoolHandle<T>,
    item: T,
}

impl<T: Reusable> Lease<'_, T> {
    /// Handle of the leased object.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> PoolHandle<T> {
        self.handle
    }
}

impl<T: Reusable> Deref for Lease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Reusable> DerefMut for Lease<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Reusable> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        let item = std::mem::take(&mut self.item);
        let returned = self.pool.give_back(self.handle, item);
        debug_assert!(returned.is_ok(), "lease handed back twice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_lend_give_back() {
        let mut pool: Pool<Vec<u32>> = Pool::new(4, 20);

        let (handle, mut list) = pool.lend(0);
        list.push(42);
        assert_eq!(pool.outstanding(), 1);

        pool.give_back(handle, list).unwrap();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_pool_reuse_is_cleared() {
        let mut pool: Pool<Vec<u32>> = Pool::new(4, 20);

        let (h1, mut list) = pool.lend(0);
        list.extend([1, 2, 3]);
        let capacity = list.capacity();
        pool.give_back(h1, list).unwrap();

        let (h2, list) = pool.lend(0);
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert!(list.is_empty());
        assert!(list.capacity() >= capacity);
        pool.give_back(h2, list).unwrap();
    }

    #[test]
    fn test_double_return_fails() {
        let mut pool: Pool<Vec<u32>> = Pool::new(4, 20);

        let (handle, list) = pool.lend(0);
        pool.give_back(handle, list).unwrap();

        let err = pool.give_back(handle, Vec::new()).unwrap_err();
        assert!(matches!(err, StrataError::PoolDoubleReturn { index: 0, .. }));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_stale_handle_after_relend_fails() {
        let mut pool: Pool<Vec<u32>> = Pool::new(4, 20);

        let (stale, list) = pool.lend(0);
        pool.give_back(stale, list).unwrap();
        let (fresh, list) = pool.lend(0);

        assert!(pool.give_back(stale, Vec::new()).is_err());
        assert_eq!(pool.outstanding(), 1);
        pool.give_back(fresh, list).unwrap();
    }

    #[test]
    fn test_lease_returns_on_drop() {
        let mut pool: Pool<IndexSet> = Pool::new(4, 20);
        {
            let mut set = pool.lease(2);
            set.insert(3);
            set.insert(3);
            assert_eq!(set.len(), 1);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_debug_output() {
        let pool: Pool<Vec<u8>> = Pool::new(1, 2);
        let text = format!("{pool:?}");
        assert!(text.contains("leak_threshold: 2"));
        assert!(text.ends_with(".. }"));
    }

    #[test]
    fn test_many_outstanding_is_not_an_error() {
        let mut pool: Pool<Vec<u8>> = Pool::new(1, 2);
        let lent: Vec<_> = (0..5).map(|_| pool.lend(1)).collect();
        assert_eq!(pool.outstanding(), 5);
        for (handle, item) in lent {
            pool.give_back(handle, item).unwrap();
        }
        assert_eq!(pool.outstanding(), 0);
    }
}

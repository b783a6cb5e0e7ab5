//! # Entity Lists
//!
//! Growable identity buffers used as query scratch space.

use std::ops::Index;

use super::pool::Reusable;
use crate::ecs::EntityId;

/// Growable list of identities.
///
/// Query results are written into pooled lists so a scan allocates only
/// when a list has to grow past its previous high-water mark.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityList {
    ids: Vec<EntityId>,
}

impl EntityList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Creates an empty list with room for `capacity` identities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
        }
    }

    /// Appends an identity.
    #[inline]
    pub fn push(&mut self, id: EntityId) {
        self.ids.push(id);
    }

    /// Removes every identity, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Returns the identity at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<EntityId> {
        self.ids.get(index).copied()
    }

    /// Returns the number of identities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Checks if the list is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the allocated capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ids.capacity()
    }

    /// Grows the allocation to hold at least `capacity` identities.
    pub fn grow_to(&mut self, capacity: usize) {
        self.ids.reserve(capacity.saturating_sub(self.ids.len()));
    }

    /// Returns the identities as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.ids
    }

    /// Iterates over the identities.
    pub fn iter(&self) -> std::slice::Iter<'_, EntityId> {
        self.ids.iter()
    }
}

impl Index<usize> for EntityList {
    type Output = EntityId;

    fn index(&self, index: usize) -> &EntityId {
        &self.ids[index]
    }
}

impl<'a> IntoIterator for &'a EntityList {
    type Item = &'a EntityId;
    type IntoIter = std::slice::Iter<'a, EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

impl Extend<EntityId> for EntityList {
    fn extend<I: IntoIterator<Item = EntityId>>(&mut self, iter: I) {
        self.ids.extend(iter);
    }
}

impl Reusable for EntityList {
    fn with_capacity(capacity: usize) -> Self {
        EntityList::with_capacity(capacity)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn ensure_capacity(&mut self, capacity: usize) {
        self.grow_to(capacity);
    }

    fn kind() -> &'static str {
        "EntityList"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_get_clear() {
        let mut list = EntityList::with_capacity(2);
        list.push(EntityId::new(1, 0, 0));
        list.push(EntityId::new(2, 1, 0));

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1), Some(EntityId::new(2, 1, 0)));
        assert_eq!(list[0].global(), 1);
        assert_eq!(list.get(2), None);

        let capacity = list.capacity();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.capacity(), capacity);
    }

    #[test]
    fn test_grow_to() {
        let mut list = EntityList::new();
        list.grow_to(64);
        assert!(list.capacity() >= 64);
    }
}

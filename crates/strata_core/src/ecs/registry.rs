//! # Entity Slot Registry
//!
//! Per-sub-world bookkeeping of which slots hold live identities.
//!
//! ```text
//! slot:        0     1     2     3     4   ...  capacity-1
//! identities: [e1]  [--]  [e3]  [e4]  [--]
//! occupied:    1     0     1     1     0
//!                               ^ highest_occupied
//! ```
//!
//! Every live slot is at or below `highest_occupied`, which lets scans stop early
//! once they have visited `len()` live entities.

use fixedbitset::FixedBitSet;

use super::entity::EntityId;
use crate::error::{StrataError, StrataResult};

/// Dense/sparse registry of live identities, indexed by slot.
#[derive(Debug)]
pub struct EntitySlotRegistry {
    /// Identity stored at each slot; `EntityId::EMPTY` when vacant.
    identities: Vec<EntityId>,
    /// Occupancy bit per slot.
    occupied: FixedBitSet,
    /// Number of live identities.
    count: usize,
    /// Upper bound of every occupied slot.
    highest_occupied: usize,
    /// Bumped on every insert and remove.
    version: u64,
}

impl EntitySlotRegistry {
    /// Creates an empty registry with room for `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        let mut occupied = FixedBitSet::with_capacity(capacity);
        occupied.grow(capacity);

        Self {
            identities: vec![EntityId::EMPTY; capacity],
            occupied,
            count: 0,
            highest_occupied: 0,
            version: 0,
        }
    }

    /// Returns the number of slots currently allocated.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.identities.len()
    }

    /// Returns the number of live identities.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Checks if no identity is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the structural version.
    #[inline]
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns the upper bound of every occupied slot.
    #[inline]
    #[must_use]
    pub const fn highest_occupied(&self) -> usize {
        self.highest_occupied
    }

    /// Returns the identity column, `EntityId::EMPTY` at vacant slots.
    #[inline]
    #[must_use]
    pub fn identities(&self) -> &[EntityId] {
        &self.identities
    }

    /// Returns the occupancy bitset.
    #[inline]
    #[must_use]
    pub fn occupied(&self) -> &FixedBitSet {
        &self.occupied
    }

    /// Checks if a slot holds a live identity.
    #[inline]
    #[must_use]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.occupied.contains(slot)
    }

    /// Returns the live identity at a slot.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<EntityId> {
        if self.is_occupied(slot) {
            Some(self.identities[slot])
        } else {
            None
        }
    }

    /// Registers a live identity at its slot, doubling the arrays when the slot
    /// lies past the end.
    ///
    /// Returns `true` if the arrays grew.
    pub fn add(&mut self, identity: EntityId) -> bool {
        let slot = identity.index();
        let grew = slot >= self.capacity();
        if grew {
            let mut capacity = self.capacity();
            while slot >= capacity {
                capacity <<= 1;
            }
            tracing::debug!(
                old_capacity = self.capacity(),
                new_capacity = capacity,
                "entity registry grew"
            );
            self.identities.resize(capacity, EntityId::EMPTY);
            self.occupied.grow(capacity);
        }

        self.occupied.insert(slot);
        self.identities[slot] = identity;
        if slot > self.highest_occupied {
            self.highest_occupied = slot;
        }

        self.count += 1;
        self.version += 1;
        grew
    }

    /// Removes a live identity.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EntityNotFound`] if the slot is out of range, vacant,
    /// or holds a physically different identity.
    pub fn remove(&mut self, identity: EntityId) -> StrataResult<()> {
        if !self.contains(identity) {
            return Err(StrataError::EntityNotFound(identity));
        }

        let slot = identity.index();
        self.identities[slot] = EntityId::EMPTY;
        self.occupied.set(slot, false);
        if self.highest_occupied == slot {
            self.highest_occupied = slot.saturating_sub(1);
        }

        self.count -= 1;
        self.version += 1;
        Ok(())
    }

    /// Checks if the identity is live at its slot (physical equality).
    #[inline]
    #[must_use]
    pub fn contains(&self, identity: EntityId) -> bool {
        if identity.is_empty() {
            return false;
        }
        let slot = identity.index();
        self.is_occupied(slot) && self.identities[slot].full_eq(identity)
    }

    /// Iterates over live identities in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.occupied
            .ones()
            .take(self.count)
            .map(move |slot| self.identities[slot])
    }

    /// Creates a detached cursor over the live identities.
    #[must_use]
    pub fn cursor(&self) -> SlotCursor {
        SlotCursor {
            next_slot: 0,
            visited: 0,
            version: self.version,
        }
    }
}

/// Restartable, detached walk over a registry.
///
/// The cursor does not borrow the registry, so the registry may be changed
/// between steps. Any such change is reported by the next step instead of
/// silently skipping or repeating entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotCursor {
    next_slot: usize,
    visited: usize,
    version: u64,
}

impl SlotCursor {
    /// Advances to the next live identity.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::ConcurrentModification`] if the registry changed
    /// since the cursor was created or last reset.
    pub fn next(&mut self, registry: &EntitySlotRegistry) -> StrataResult<Option<EntityId>> {
        if self.version != registry.version {
            return Err(StrataError::ConcurrentModification {
                expected: self.version,
                found: registry.version,
            });
        }

        while self.visited < registry.count && self.next_slot <= registry.highest_occupied {
            let slot = self.next_slot;
            self.next_slot += 1;
            if let Some(identity) = registry.get(slot) {
                self.visited += 1;
                return Ok(Some(identity));
            }
        }
        Ok(None)
    }

    /// Rewinds the cursor and re-arms it against the registry's current version.
    pub fn reset(&mut self, registry: &EntitySlotRegistry) {
        *self = registry.cursor();
    }
}

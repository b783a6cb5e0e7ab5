//! # Entity Identities
//!
//! An entity is identified by three fields:
//! - A global id, unique for the lifetime of the world and never reused
//! - A slot into the owning sub world's per-entity arrays, recycled after deletion
//! - The id of the owning sub world
//!
//! Two equalities coexist. The `PartialEq`/`Hash`/`Ord` impls compare the global
//! id only, so an identity stays the same key however its slot is reused.
//! [`EntityId::full_eq`] compares all three fields and is what slot validation uses
//! to reject stale identities.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};

/// Packed entity identity.
///
/// The 64-bit form is `(sub_world << 48) | (slot << 32) | global`.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct EntityId {
    global: i32,
    slot: i16,
    sub_world: i16,
}

impl EntityId {
    /// The empty identity. Global id 0 is never assigned to a live entity.
    pub const EMPTY: Self = Self::new(0, 0, 0);

    /// Creates an identity from its parts.
    #[inline]
    #[must_use]
    pub const fn new(global: i32, slot: i16, sub_world: i16) -> Self {
        Self {
            global,
            slot,
            sub_world,
        }
    }

    /// Returns the world-unique global id.
    #[inline]
    #[must_use]
    pub const fn global(self) -> i32 {
        self.global
    }

    /// Returns the slot inside the owning sub world.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> i16 {
        self.slot
    }

    /// Returns the slot as an array index.
    ///
    /// The slot is read as its unsigned 16-bit pattern.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn index(self) -> usize {
        self.slot as u16 as usize
    }

    /// Returns the id of the owning sub world.
    #[inline]
    #[must_use]
    pub const fn sub_world(self) -> i16 {
        self.sub_world
    }

    /// Checks if this is the empty identity.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.global == 0
    }

    /// Physical equality: global id, slot and sub world all match.
    #[inline]
    #[must_use]
    pub const fn full_eq(self, other: Self) -> bool {
        self.global == other.global
            && self.slot == other.slot
            && self.sub_world == other.sub_world
    }

    /// Packs the identity into 64 bits.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub const fn to_bits(self) -> i64 {
        (((self.sub_world as u16 as u64) << 48)
            | ((self.slot as u16 as u64) << 32)
            | (self.global as u32 as u64)) as i64
    }

    /// Unpacks an identity produced by [`to_bits`](Self::to_bits).
    #[inline]
    #[must_use]
    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )]
    pub const fn from_bits(bits: i64) -> Self {
        let bits = bits as u64;
        Self {
            global: bits as u32 as i32,
            slot: (bits >> 32) as u16 as i16,
            sub_world: (bits >> 48) as u16 as i16,
        }
    }
}

impl PartialEq for EntityId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.global == other.global
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.global.hash(state);
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.global.cmp(&other.global)
    }
}

impl From<EntityId> for i64 {
    fn from(id: EntityId) -> Self {
        id.to_bits()
    }
}

impl From<i64> for EntityId {
    fn from(bits: i64) -> Self {
        Self::from_bits(bits)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityId(global: {}, slot: {}, sub_world: {})",
            self.global, self.slot, self.sub_world
        )
    }
}

/// Dense id of a sub world inside its world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubWorldId(i16);

impl SubWorldId {
    /// Creates a sub world id.
    #[inline]
    #[must_use]
    pub const fn new(id: i16) -> Self {
        Self(id)
    }

    /// Returns the raw 16-bit id stored in entity identities.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i16 {
        self.0
    }

    /// Returns the id as an array index.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn index(self) -> usize {
        self.0 as u16 as usize
    }
}

impl From<EntityId> for SubWorldId {
    fn from(id: EntityId) -> Self {
        Self(id.sub_world)
    }
}

impl fmt::Display for SubWorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bit_layout() {
        let id = EntityId::new(7, 3, 2);
        assert_eq!(id.to_bits(), (2_i64 << 48) | (3_i64 << 32) | 7);
        assert!(EntityId::from_bits(id.to_bits()).full_eq(id));
    }

    #[test]
    fn test_bit_layout_extremes() {
        let id = EntityId::new(i32::MAX, i16::MAX, i16::MAX);
        assert!(EntityId::from(i64::from(id)).full_eq(id));

        let negative = EntityId::new(-1, 0, 1);
        assert!(EntityId::from_bits(negative.to_bits()).full_eq(negative));
    }

    #[test]
    fn test_logical_vs_physical_equality() {
        let original = EntityId::new(10, 4, 0);
        let moved = EntityId::new(10, 9, 0);
        let recycled = EntityId::new(11, 4, 0);

        assert_eq!(original, moved);
        assert!(!original.full_eq(moved));
        assert_ne!(original, recycled);
        assert!(!original.full_eq(recycled));
    }

    #[test]
    fn test_hash_follows_global_id() {
        let mut set = HashSet::new();
        set.insert(EntityId::new(5, 1, 0));
        assert!(set.contains(&EntityId::new(5, 2, 3)));
        assert!(!set.contains(&EntityId::new(6, 1, 0)));
    }

    #[test]
    fn test_ordering_by_global_id() {
        let mut ids = vec![
            EntityId::new(3, 0, 0),
            EntityId::new(1, 7, 0),
            EntityId::new(2, 2, 1),
        ];
        ids.sort();
        let globals: Vec<i32> = ids.iter().map(|id| id.global()).collect();
        assert_eq!(globals, vec![1, 2, 3]);
    }

    #[test]
    fn test_index_reads_unsigned_pattern() {
        assert_eq!(EntityId::new(1, i16::MAX, 0).index(), 32_767);
        assert_eq!(EntityId::new(1, -1, 0).index(), 65_535);
        assert_eq!(SubWorldId::new(-1).index(), 65_535);
        assert_eq!(EntityId::from_bits(-1).slot(), -1);
        assert_eq!(EntityId::from_bits(-1).global(), -1);
    }

    #[test]
    fn test_empty() {
        assert!(EntityId::EMPTY.is_empty());
        assert!(EntityId::default().is_empty());
        assert!(!EntityId::new(1, 0, 0).is_empty());
    }
}

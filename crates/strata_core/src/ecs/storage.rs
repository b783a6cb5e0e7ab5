//! # Component Tables
//!
//! Columnar, slot-indexed storage for one component type in one sub world.
//!
//! The table uses a dense array strategy:
//! - A value column and a presence bitset, both indexed by slot
//! - Both grow in lockstep with the owning registry's capacity
//! - Access is O(1) via the identity's slot
//!
//! A table may lag behind its registry between growth events. Slots past the
//! end of the column read as absent.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use fixedbitset::FixedBitSet;

use super::component::Component;
use super::entity::{EntityId, SubWorldId};
use super::registry::EntitySlotRegistry;
use crate::error::{StrataError, StrataResult};
use crate::memory::EntityList;

/// Storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut table: ComponentTable<Position> = ComponentTable::new(256);
/// table.set(id, Position { x: 1.0, y: 2.0 });
/// assert!(table.contains(id));
/// ```
pub struct ComponentTable<C: Component> {
    /// The value column.
    values: Vec<C>,
    /// Presence bit per slot.
    present: FixedBitSet,
    /// Number of attached components.
    count: usize,
    /// Bumped every time the column is replaced by a larger one.
    growth: u64,
}

impl<C: Component> ComponentTable<C> {
    /// Creates an empty table with the specified slot capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut present = FixedBitSet::with_capacity(capacity);
        present.grow(capacity);

        Self {
            values: vec![C::zeroed(); capacity],
            present,
            count: 0,
            growth: 0,
        }
    }

    /// Returns the slot capacity of this table.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Returns the number of entities carrying this component.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Checks if no entity carries this component.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the growth stamp, bumped whenever the column is reallocated.
    #[inline]
    #[must_use]
    pub const fn growth_version(&self) -> u64 {
        self.growth
    }

    /// Checks if the entity at the identity's slot carries this component.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.present.contains(id.index())
    }

    /// Gets a copy of the component.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<C> {
        self.get_ref(id).copied()
    }

    /// Gets a copy of the component, failing if it is not attached.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EntityNotFound`] if the entity does not carry it.
    #[inline]
    pub fn try_get(&self, id: EntityId) -> StrataResult<C> {
        self.get(id).ok_or(StrataError::EntityNotFound(id))
    }

    /// Gets a reference to the component.
    #[inline]
    #[must_use]
    pub fn get_ref(&self, id: EntityId) -> Option<&C> {
        let slot = id.index();
        if self.present.contains(slot) {
            Some(&self.values[slot])
        } else {
            None
        }
    }

    /// Gets a mutable reference to the component.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut C> {
        let slot = id.index();
        if self.present.contains(slot) {
            Some(&mut self.values[slot])
        } else {
            None
        }
    }

    /// Attaches or overwrites the component.
    ///
    /// Grows the table first if the slot lies past the end of the column.
    pub fn set(&mut self, id: EntityId, component: C) {
        let slot = id.index();
        if slot >= self.capacity() {
            self.resize_to((slot + 1).next_power_of_two());
        }

        self.values[slot] = component;
        if !self.present.put(slot) {
            self.count += 1;
        }
    }

    /// Detaches the component.
    ///
    /// Returns `true` if it was attached.
    pub fn delete(&mut self, id: EntityId) -> bool {
        self.delete_slot(id.index())
    }

    /// Detaches the component at a slot, zeroing the cell.
    pub(crate) fn delete_slot(&mut self, slot: usize) -> bool {
        if !self.present.contains(slot) {
            return false;
        }
        self.present.set(slot, false);
        self.values[slot] = C::zeroed();
        self.count -= 1;
        true
    }

    /// Detaches the component from every entity.
    ///
    /// This keeps the column allocated.
    pub fn delete_all(&mut self) {
        for slot in self.present.ones() {
            self.values[slot] = C::zeroed();
        }
        self.present.clear();
        self.count = 0;
    }

    /// Direct slot access for the hot loop of a resolved query.
    ///
    /// Reads a zeroed cell if the slot carries no component.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is past the end of the column.
    #[inline]
    pub fn get_raw(&mut self, slot: usize) -> &mut C {
        &mut self.values[slot]
    }

    /// Returns the whole value column.
    #[inline]
    #[must_use]
    pub fn raw_values(&self) -> &[C] {
        &self.values
    }

    /// Returns the whole value column mutably.
    #[inline]
    pub fn raw_values_mut(&mut self) -> &mut [C] {
        &mut self.values
    }

    /// Returns the presence bitset.
    #[inline]
    #[must_use]
    pub fn raw_presence(&self) -> &FixedBitSet {
        &self.present
    }

    /// Returns the value column mutably alongside the presence bitset.
    #[inline]
    pub fn columns_mut(&mut self) -> (&mut [C], &FixedBitSet) {
        (&mut self.values, &self.present)
    }

    /// Grows the column and bitset to at least `capacity` slots.
    ///
    /// Existing entries are preserved. Returns `true` if the table grew.
    pub fn resize_to(&mut self, capacity: usize) -> bool {
        if capacity <= self.capacity() {
            return false;
        }
        self.values.resize(capacity, C::zeroed());
        self.present.grow(capacity);
        self.growth += 1;
        true
    }

    /// Iterates over `(slot, component)` for every attached component.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &C)> + '_ {
        self.present.ones().map(move |slot| (slot, &self.values[slot]))
    }
}

impl<C: Component> fmt::Debug for ComponentTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTable")
            .field("component", &C::name())
            .field("len", &self.count)
            .field("capacity", &self.capacity())
            .field("growth", &self.growth)
            .finish_non_exhaustive()
    }
}

/// Type-erased view of a [`ComponentTable`], as held by a sub world's table registry.
pub trait Table: Any {
    /// Name of the stored component type.
    fn component_name(&self) -> &'static str;

    /// `TypeId` of the stored component type.
    fn component_type(&self) -> TypeId;

    /// Checks the presence bit at a slot.
    fn contains_slot(&self, slot: usize) -> bool;

    /// The component value at a slot, if present.
    fn value_at(&self, slot: usize) -> Option<&dyn Any>;

    /// Detaches the component at a slot. Returns `true` if it was attached.
    fn delete_slot(&mut self, slot: usize) -> bool;

    /// Detaches the component from every entity.
    fn delete_all(&mut self);

    /// Number of attached components.
    fn len(&self) -> usize;

    /// Checks if no component is attached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot capacity.
    fn capacity(&self) -> usize;

    /// Grows to at least `capacity` slots. Returns `true` if the table grew.
    fn resize_to(&mut self, capacity: usize) -> bool;

    /// Presence bitset.
    fn presence(&self) -> &FixedBitSet;

    /// Growth stamp.
    fn growth_version(&self) -> u64;

    /// Appends the live identity of every entity carrying the component.
    fn collect_entities(&self, registry: &EntitySlotRegistry, out: &mut EntityList);

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> Table for ComponentTable<C> {
    fn component_name(&self) -> &'static str {
        C::name()
    }

    fn component_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn contains_slot(&self, slot: usize) -> bool {
        self.present.contains(slot)
    }

    fn value_at(&self, slot: usize) -> Option<&dyn Any> {
        if self.present.contains(slot) {
            Some(&self.values[slot])
        } else {
            None
        }
    }

    fn delete_slot(&mut self, slot: usize) -> bool {
        ComponentTable::delete_slot(self, slot)
    }

    fn delete_all(&mut self) {
        ComponentTable::delete_all(self);
    }

    fn len(&self) -> usize {
        self.count
    }

    fn capacity(&self) -> usize {
        self.values.len()
    }

    fn resize_to(&mut self, capacity: usize) -> bool {
        ComponentTable::resize_to(self, capacity)
    }

    fn presence(&self) -> &FixedBitSet {
        &self.present
    }

    fn growth_version(&self) -> u64 {
        self.growth
    }

    fn collect_entities(&self, registry: &EntitySlotRegistry, out: &mut EntityList) {
        for slot in self.present.ones() {
            if let Some(id) = registry.get(slot) {
                out.push(id);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed token for a table registered in a sub world.
///
/// Resolves to the table without a type-map lookup.
#[derive(Clone, Copy)]
pub struct TableHandle<C: Component> {
    index: usize,
    sub_world: SubWorldId,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> TableHandle<C> {
    pub(crate) const fn new(index: usize, sub_world: SubWorldId) -> Self {
        Self {
            index,
            sub_world,
            _marker: PhantomData,
        }
    }

    /// Dense table index inside the sub world.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    /// The sub world that owns the table.
    #[inline]
    #[must_use]
    pub const fn sub_world(self) -> SubWorldId {
        self.sub_world
    }
}

impl<C: Component> PartialEq for TableHandle<C> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.sub_world == other.sub_world
    }
}

impl<C: Component> Eq for TableHandle<C> {}

impl<C: Component> fmt::Debug for TableHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle")
            .field("component", &C::name())
            .field("index", &self.index)
            .field("sub_world", &self.sub_world)
            .finish()
    }
}

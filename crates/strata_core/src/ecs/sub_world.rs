//! # Sub Worlds
//!
//! An independent namespace of entities and their component tables.
//!
//! A sub world owns:
//! - One [`EntitySlotRegistry`]
//! - One [`ComponentTable`] per registered component type, by dense index
//! - A LIFO stack of recycled slots
//! - The cache of resolved filter shapes
//!
//! Sub worlds are created and routed to by a [`World`](super::World).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use fixedbitset::FixedBitSet;

use super::component::Component;
use super::descriptor::TypeDescriptor;
use super::entity::{EntityId, SubWorldId};
use super::filter::Filter;
use super::registry::{EntitySlotRegistry, SlotCursor};
use super::shape::{ComponentSet, FilterShape};
use super::storage::{ComponentTable, Table, TableHandle};
use crate::config::WorldConfig;
use crate::error::{StrataError, StrataResult};
use crate::memory::ResourcePool;

/// Marker type naming a sub world.
///
/// # Example
///
/// ```rust
/// use strata_core::SubWorldKind;
///
/// struct Game;
///
/// impl SubWorldKind for Game {
///     const NAME: &'static str = "Game";
/// }
/// ```
pub trait SubWorldKind: 'static {
    /// Name used in errors and logs.
    const NAME: &'static str;
}

/// Direct view of one component table for hand-written hot loops.
///
/// All four fields are indexed by slot. A slot carries the component only if
/// its `presence` bit is set; `ids` holds `EntityId::EMPTY` at vacant slots.
#[derive(Debug)]
pub struct DirectComponents<'a, C: Component> {
    /// The value column.
    pub values: &'a mut [C],
    /// The presence bitset.
    pub presence: &'a FixedBitSet,
    /// The registry's identity column.
    pub ids: &'a [EntityId],
    /// Number of entities carrying the component.
    pub count: usize,
}

/// One namespace of entities, tables and cached filter shapes.
pub struct SubWorld {
    id: SubWorldId,
    name: &'static str,
    registry: EntitySlotRegistry,
    /// Tables by dense component index.
    tables: Vec<Box<dyn Table>>,
    /// Component `TypeId` to dense index.
    type_index: HashMap<TypeId, usize>,
    /// Recycled slots, reused last-in first-out.
    free_slots: Vec<i16>,
    /// Next never-used slot.
    next_slot: usize,
    /// Resolved shapes by shape `TypeId`.
    descriptors: HashMap<TypeId, Arc<TypeDescriptor>>,
}

impl SubWorld {
    pub(crate) fn new(id: SubWorldId, name: &'static str, config: &WorldConfig) -> Self {
        Self {
            id,
            name,
            registry: EntitySlotRegistry::new(config.initial_entity_capacity),
            tables: Vec::with_capacity(config.table_capacity_hint),
            type_index: HashMap::with_capacity(config.table_capacity_hint),
            free_slots: Vec::new(),
            next_slot: 0,
            descriptors: HashMap::new(),
        }
    }

    /// Returns the id of this sub world.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SubWorldId {
        self.id
    }

    /// Returns the name of this sub world.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.registry.len()
    }

    /// Checks if no entity is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Returns the slot registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &EntitySlotRegistry {
        &self.registry
    }

    /// Checks if the identity is live in this sub world.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.registry.contains(id)
    }

    /// Iterates over live identities in ascending slot order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.registry.iter()
    }

    /// Creates a detached cursor over the live identities.
    #[must_use]
    pub fn cursor(&self) -> SlotCursor {
        self.registry.cursor()
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Registers a table for component `C`.
    ///
    /// Must be called before any entity in this sub world can carry `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::DuplicateComponent`] if `C` already has a table.
    pub fn register_table<C: Component>(&mut self) -> StrataResult<TableHandle<C>> {
        let type_id = TypeId::of::<C>();
        if self.type_index.contains_key(&type_id) {
            return Err(StrataError::DuplicateComponent {
                component: C::name(),
                sub_world: self.name,
            });
        }

        let index = self.tables.len();
        self.tables
            .push(Box::new(ComponentTable::<C>::new(self.registry.capacity())));
        self.type_index.insert(type_id, index);

        tracing::debug!(
            component = C::name(),
            sub_world = self.name,
            index,
            "registered component table"
        );
        Ok(TableHandle::new(index, self.id))
    }

    /// Returns the dense index of the table for `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn table_index<C: Component>(&self) -> StrataResult<usize> {
        self.type_index
            .get(&TypeId::of::<C>())
            .copied()
            .ok_or(StrataError::UnregisteredComponent {
                component: C::name(),
                sub_world: self.name,
            })
    }

    /// Returns the handle of the table for `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn table_handle<C: Component>(&self) -> StrataResult<TableHandle<C>> {
        self.table_index::<C>()
            .map(|index| TableHandle::new(index, self.id))
    }

    /// Returns the table for `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn table<C: Component>(&self) -> StrataResult<&ComponentTable<C>> {
        let index = self.table_index::<C>()?;
        self.typed_table(index)
    }

    /// Returns the table for `C` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn table_mut<C: Component>(&mut self) -> StrataResult<&mut ComponentTable<C>> {
        let index = self.table_index::<C>()?;
        self.typed_table_mut(index)
    }

    /// Returns the table a handle points at, without a type-map lookup.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if the handle belongs to
    /// another sub world.
    pub fn table_by_handle<C: Component>(
        &self,
        handle: TableHandle<C>,
    ) -> StrataResult<&ComponentTable<C>> {
        if handle.sub_world() != self.id {
            return Err(self.unregistered::<C>());
        }
        self.typed_table(handle.index())
    }

    /// Returns the table a handle points at mutably.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if the handle belongs to
    /// another sub world.
    pub fn table_by_handle_mut<C: Component>(
        &mut self,
        handle: TableHandle<C>,
    ) -> StrataResult<&mut ComponentTable<C>> {
        if handle.sub_world() != self.id {
            return Err(self.unregistered::<C>());
        }
        self.typed_table_mut(handle.index())
    }

    /// Names of every registered component, by dense index.
    pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|table| table.component_name())
    }

    fn typed_table<C: Component>(&self, index: usize) -> StrataResult<&ComponentTable<C>> {
        self.tables
            .get(index)
            .and_then(|table| table.as_any().downcast_ref::<ComponentTable<C>>())
            .ok_or_else(|| self.unregistered::<C>())
    }

    fn typed_table_mut<C: Component>(&mut self, index: usize) -> StrataResult<&mut ComponentTable<C>> {
        let unregistered = self.unregistered::<C>();
        self.tables
            .get_mut(index)
            .and_then(|table| table.as_any_mut().downcast_mut::<ComponentTable<C>>())
            .ok_or(unregistered)
    }

    fn unregistered<C: Component>(&self) -> StrataError {
        StrataError::UnregisteredComponent {
            component: C::name(),
            sub_world: self.name,
        }
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Assigns a slot to a new entity with the given global id.
    ///
    /// Recycled slots are reused last-in first-out. When the registry grows,
    /// every table grows with it.
    pub(crate) fn create_entity(&mut self, global: i32) -> StrataResult<EntityId> {
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                let slot = i16::try_from(self.next_slot)
                    .map_err(|_| StrataError::SlotsExhausted(self.name))?;
                self.next_slot += 1;
                slot
            }
        };

        let id = EntityId::new(global, slot, self.id.get());
        if self.registry.add(id) {
            let capacity = self.registry.capacity();
            for table in &mut self.tables {
                table.resize_to(capacity);
            }
        }
        Ok(id)
    }

    /// Removes an entity and every component it carries.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EntityNotFound`] if the identity is not live here.
    /// Nothing is touched in that case.
    pub(crate) fn delete_entity(&mut self, id: EntityId) -> StrataResult<()> {
        if !self.registry.contains(id) {
            return Err(StrataError::EntityNotFound(id));
        }

        let slot = id.index();
        for table in &mut self.tables {
            table.delete_slot(slot);
        }
        self.registry.remove(id)?;
        self.free_slots.push(id.slot());
        Ok(())
    }

    // =========================================================================
    // Component access
    // =========================================================================

    /// Checks if a live entity carries component `C`.
    ///
    /// Stale identities carry nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn has<C: Component>(&self, id: EntityId) -> StrataResult<bool> {
        let table = self.table::<C>()?;
        Ok(self.registry.contains(id) && table.contains(id))
    }

    /// Gets a copy of component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn get<C: Component>(&self, id: EntityId) -> StrataResult<Option<C>> {
        let table = self.table::<C>()?;
        if !self.registry.contains(id) {
            return Ok(None);
        }
        Ok(table.get(id))
    }

    /// Gets a mutable reference to component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> StrataResult<Option<&mut C>> {
        let live = self.registry.contains(id);
        let table = self.table_mut::<C>()?;
        Ok(if live { table.get_mut(id) } else { None })
    }

    /// Attaches or overwrites component `C`.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnregisteredComponent`] if `C` has no table
    /// - [`StrataError::EntityNotFound`] if the identity is not live here
    pub fn set<C: Component>(&mut self, id: EntityId, component: C) -> StrataResult<()> {
        let live = self.registry.contains(id);
        let table = self.table_mut::<C>()?;
        if !live {
            return Err(StrataError::EntityNotFound(id));
        }
        table.set(id, component);
        Ok(())
    }

    /// Detaches component `C`. Returns `true` if it was attached.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn delete<C: Component>(&mut self, id: EntityId) -> StrataResult<bool> {
        let live = self.registry.contains(id);
        let table = self.table_mut::<C>()?;
        Ok(live && table.delete(id))
    }

    /// Appends the name of every component a live entity carries.
    ///
    /// Names only. Use [`components`](Self::components) for the values.
    pub fn component_types(&self, id: EntityId, out: &mut Vec<&'static str>) {
        if !self.registry.contains(id) {
            return;
        }
        let slot = id.index();
        out.extend(
            self.tables
                .iter()
                .filter(|table| table.contains_slot(slot))
                .map(|table| table.component_name()),
        );
    }

    /// Appends every component value a live entity carries, by table index.
    ///
    /// Each value downcasts to its component type.
    pub fn components<'a>(&'a self, id: EntityId, out: &mut Vec<&'a dyn Any>) {
        if !self.registry.contains(id) {
            return;
        }
        let slot = id.index();
        out.extend(self.tables.iter().filter_map(|table| table.value_at(slot)));
    }

    /// Direct access to the columns of component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredComponent`] if `C` has no table.
    pub fn direct_mut<C: Component>(&mut self) -> StrataResult<DirectComponents<'_, C>> {
        let index = self.table_index::<C>()?;
        let unregistered = self.unregistered::<C>();
        let table = self
            .tables
            .get_mut(index)
            .and_then(|table| table.as_any_mut().downcast_mut::<ComponentTable<C>>())
            .ok_or(unregistered)?;

        let count = table.len();
        let (values, presence) = table.columns_mut();
        Ok(DirectComponents {
            values,
            presence,
            ids: self.registry.identities(),
            count,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns a filter for shape `S`, resolving and caching the shape on first use.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnregisteredComponent`] if the shape names a component
    ///   with no table here
    /// - [`StrataError::ConflictingShape`] if the shape names a component twice
    pub fn when_all<S: FilterShape>(&mut self, pool: &mut ResourcePool) -> StrataResult<Filter<S>> {
        let key = TypeId::of::<S>();
        let descriptor = if let Some(descriptor) = self.descriptors.get(&key) {
            Arc::clone(descriptor)
        } else {
            let mut seen = pool.index_sets().lease(
                <S::Include as ComponentSet>::LEN + <S::Exclude as ComponentSet>::LEN,
            );
            let descriptor = Arc::new(TypeDescriptor::resolve::<S>(
                self.id,
                self.name,
                &self.type_index,
                &mut seen,
            )?);
            self.descriptors.insert(key, Arc::clone(&descriptor));
            descriptor
        };

        Ok(Filter::new(descriptor, &self.tables))
    }

    /// Number of cached filter shapes.
    #[inline]
    #[must_use]
    pub fn cached_shapes(&self) -> usize {
        self.descriptors.len()
    }

    pub(crate) fn tables(&self) -> &[Box<dyn Table>] {
        &self.tables
    }

    pub(crate) fn query_parts(&mut self) -> (&EntitySlotRegistry, &mut [Box<dyn Table>]) {
        (&self.registry, self.tables.as_mut_slice())
    }
}

impl std::fmt::Debug for SubWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubWorld")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entities", &self.registry.len())
            .field("capacity", &self.registry.capacity())
            .field("tables", &self.tables.len())
            .field("free_slots", &self.free_slots.len())
            .field("cached_shapes", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Score(u32);
    impl Component for Score {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Lives(u8);
    impl Component for Lives {}

    fn sub_world(capacity: usize) -> SubWorld {
        let config = WorldConfig {
            initial_entity_capacity: capacity,
            ..WorldConfig::default()
        };
        let mut sub_world = SubWorld::new(SubWorldId::new(3), "Arcade", &config);
        sub_world.register_table::<Score>().unwrap();
        sub_world
    }

    #[test]
    fn test_register_table_twice_fails() {
        let mut sub_world = sub_world(4);
        let err = sub_world.register_table::<Score>().unwrap_err();
        assert_eq!(
            err,
            StrataError::DuplicateComponent {
                component: Score::name(),
                sub_world: "Arcade"
            }
        );
    }

    #[test]
    fn test_unregistered_component_is_a_lookup_error() {
        let mut sub_world = sub_world(4);
        let id = sub_world.create_entity(1).unwrap();
        let err = sub_world.set(id, Lives(3)).unwrap_err();
        assert!(matches!(err, StrataError::UnregisteredComponent { .. }));
        assert!(err.is_contract_violation());
        assert!(sub_world.has::<Lives>(id).is_err());
    }

    #[test]
    fn test_slots_are_recycled_lifo() {
        let mut sub_world = sub_world(4);
        let a = sub_world.create_entity(1).unwrap();
        let b = sub_world.create_entity(2).unwrap();
        sub_world.delete_entity(a).unwrap();
        sub_world.delete_entity(b).unwrap();

        assert_eq!(sub_world.create_entity(3).unwrap().slot(), b.slot());
        assert_eq!(sub_world.create_entity(4).unwrap().slot(), a.slot());
        assert_eq!(sub_world.create_entity(5).unwrap().slot(), 2);
    }

    #[test]
    fn test_identity_carries_sub_world() {
        let mut sub_world = sub_world(4);
        let id = sub_world.create_entity(9).unwrap();
        assert_eq!(SubWorldId::from(id), sub_world.id());
        assert_eq!(id.global(), 9);
    }

    #[test]
    fn test_growth_resizes_tables() {
        let mut sub_world = sub_world(2);
        sub_world.register_table::<Lives>().unwrap();
        for global in 1..=3 {
            sub_world.create_entity(global).unwrap();
        }
        assert_eq!(sub_world.registry().capacity(), 4);
        assert_eq!(sub_world.table::<Score>().unwrap().capacity(), 4);
        assert_eq!(sub_world.table::<Lives>().unwrap().growth_version(), 1);
    }

    #[test]
    fn test_delete_entity_clears_components() {
        let mut sub_world = sub_world(4);
        let id = sub_world.create_entity(1).unwrap();
        sub_world.set(id, Score(10)).unwrap();

        sub_world.delete_entity(id).unwrap();
        assert!(!sub_world.contains(id));
        assert!(sub_world.table::<Score>().unwrap().is_empty());

        let reused = sub_world.create_entity(2).unwrap();
        assert_eq!(reused.slot(), id.slot());
        assert_eq!(sub_world.get::<Score>(reused).unwrap(), None);
    }

    #[test]
    fn test_stale_identity_is_rejected_without_side_effects() {
        let mut sub_world = sub_world(4);
        let old = sub_world.create_entity(1).unwrap();
        sub_world.delete_entity(old).unwrap();
        let new = sub_world.create_entity(2).unwrap();
        sub_world.set(new, Score(5)).unwrap();

        assert_eq!(sub_world.delete_entity(old), Err(StrataError::EntityNotFound(old)));
        assert_eq!(sub_world.set(old, Score(1)), Err(StrataError::EntityNotFound(old)));
        assert_eq!(sub_world.get::<Score>(old).unwrap(), None);
        assert!(!sub_world.delete::<Score>(old).unwrap());
        assert_eq!(sub_world.get::<Score>(new).unwrap(), Some(Score(5)));
    }

    #[test]
    fn test_component_types() {
        let mut sub_world = sub_world(4);
        sub_world.register_table::<Lives>().unwrap();
        let id = sub_world.create_entity(1).unwrap();
        sub_world.set(id, Lives(2)).unwrap();

        let mut names = Vec::new();
        sub_world.component_types(id, &mut names);
        assert_eq!(names, vec![Lives::name()]);
    }

    #[test]
    fn test_components_returns_values() {
        let mut sub_world = sub_world(4);
        sub_world.register_table::<Lives>().unwrap();
        let id = sub_world.create_entity(1).unwrap();
        sub_world.set(id, Score(12)).unwrap();
        sub_world.set(id, Lives(2)).unwrap();

        let mut values = Vec::new();
        sub_world.components(id, &mut values);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].downcast_ref::<Score>(), Some(&Score(12)));
        assert_eq!(values[1].downcast_ref::<Lives>(), Some(&Lives(2)));

        sub_world.delete_entity(id).unwrap();
        let mut stale = Vec::new();
        sub_world.components(id, &mut stale);
        assert!(stale.is_empty());
    }

    #[test]
    fn test_direct_mut() {
        let mut sub_world = sub_world(4);
        let a = sub_world.create_entity(1).unwrap();
        let b = sub_world.create_entity(2).unwrap();
        sub_world.set(b, Score(4)).unwrap();

        let direct = sub_world.direct_mut::<Score>().unwrap();
        assert_eq!(direct.count, 1);
        assert!(!direct.presence.contains(a.index()));
        for slot in direct.presence.ones() {
            assert!(direct.ids[slot].full_eq(b));
            direct.values[slot].0 *= 2;
        }
        assert_eq!(sub_world.get::<Score>(b).unwrap(), Some(Score(8)));
    }

    #[test]
    fn test_table_handles() {
        let mut sub_world = sub_world(4);
        let handle = sub_world.table_handle::<Score>().unwrap();
        assert_eq!(handle.index(), 0);
        assert_eq!(handle.sub_world(), SubWorldId::new(3));

        let id = sub_world.create_entity(1).unwrap();
        sub_world.table_by_handle_mut(handle).unwrap().set(id, Score(1));
        assert!(sub_world.table_by_handle(handle).unwrap().contains(id));

        let foreign = TableHandle::<Score>::new(0, SubWorldId::new(0));
        assert!(sub_world.table_by_handle(foreign).is_err());
    }

    #[test]
    fn test_shapes_are_cached() {
        let mut sub_world = sub_world(4);
        let mut pool = ResourcePool::default();

        let first = sub_world.when_all::<(Score,)>(&mut pool).unwrap();
        let second = sub_world.when_all::<(Score,)>(&mut pool).unwrap();
        assert_eq!(sub_world.cached_shapes(), 1);
        assert!(std::ptr::eq(first.descriptor(), second.descriptor()));
        assert_eq!(pool.outstanding(), 0);

        assert!(sub_world.when_all::<(Lives,)>(&mut pool).is_err());
        assert_eq!(sub_world.cached_shapes(), 1);
    }

    #[test]
    fn test_cursor_over_sub_world() {
        let mut sub_world = sub_world(4);
        let a = sub_world.create_entity(1).unwrap();
        let mut cursor = sub_world.cursor();
        assert_eq!(cursor.next(sub_world.registry()).unwrap(), Some(a));

        sub_world.create_entity(2).unwrap();
        assert!(cursor.next(sub_world.registry()).is_err());
    }
}

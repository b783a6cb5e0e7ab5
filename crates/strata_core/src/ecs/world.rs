//! # World
//!
//! The central container: a fixed set of sub worlds, the global identity
//! counter and the resource pool every query borrows scratch space from.

use std::any::TypeId;
use std::collections::HashMap;

use super::component::Component;
use super::entity::{EntityId, SubWorldId};
use super::filter::Filter;
use super::shape::FilterShape;
use super::storage::TableHandle;
use super::sub_world::{SubWorld, SubWorldKind};
use crate::config::WorldConfig;
use crate::error::{StrataError, StrataResult};
use crate::memory::ResourcePool;

/// The world - container for all entity state.
///
/// Global ids come from a single counter that starts above zero and is never
/// reset, so a global id is never handed out twice. Slots are assigned by the
/// owning sub world and recycled.
///
/// # Example
///
/// ```rust
/// use strata_core::{StrataResult, SubWorldKind, World};
///
/// struct Game;
///
/// impl SubWorldKind for Game {
///     const NAME: &'static str = "Game";
/// }
///
/// fn main() -> StrataResult<()> {
///     let mut world = World::new();
///     world.register_sub_world::<Game>()?;
///
///     let entity = world.create_entity::<Game>()?;
///     assert!(world.contains(entity));
///
///     world.delete_entity(entity)?;
///     assert!(!world.contains(entity));
///     Ok(())
/// }
/// ```
pub struct World {
    config: WorldConfig,
    /// Sub worlds, indexed by id.
    sub_worlds: Vec<SubWorld>,
    /// Sub world kind to id.
    kinds: HashMap<TypeId, SubWorldId>,
    /// Last global id handed out. Zero means none yet.
    last_global_id: i32,
    /// Scratch space for queries.
    pool: ResourcePool,
}

impl World {
    /// Creates an empty world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        let config = WorldConfig::default();
        let pool = ResourcePool::new(&config);
        Self {
            sub_worlds: Vec::new(),
            kinds: HashMap::new(),
            last_global_id: 0,
            pool,
            config,
        }
    }

    /// Creates an empty world with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidConfig`] if the configuration is invalid.
    pub fn with_config(config: WorldConfig) -> StrataResult<Self> {
        config.validate()?;
        let pool = ResourcePool::new(&config);
        Ok(Self {
            sub_worlds: Vec::with_capacity(config.sub_world_capacity.min(16)),
            kinds: HashMap::new(),
            last_global_id: 0,
            pool,
            config,
        })
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Returns the last global id handed out, or 0 if none has been.
    #[inline]
    #[must_use]
    pub const fn last_global_id(&self) -> i32 {
        self.last_global_id
    }

    /// Returns the number of live entities across every sub world.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sub_worlds.iter().map(SubWorld::len).sum()
    }

    /// Checks if no entity is live in any sub world.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sub_worlds.iter().all(SubWorld::is_empty)
    }

    /// Returns the resource pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Returns the resource pool mutably.
    #[inline]
    pub fn pool_mut(&mut self) -> &mut ResourcePool {
        &mut self.pool
    }

    // =========================================================================
    // Sub worlds
    // =========================================================================

    /// Registers sub world kind `K`, assigning the next dense id.
    ///
    /// # Errors
    ///
    /// - [`StrataError::DuplicateSubWorld`] if `K` is already registered
    /// - [`StrataError::SubWorldCapacity`] if the world is full
    pub fn register_sub_world<K: SubWorldKind>(&mut self) -> StrataResult<SubWorldId> {
        let kind = TypeId::of::<K>();
        if self.kinds.contains_key(&kind) {
            return Err(StrataError::DuplicateSubWorld(K::NAME));
        }

        let capacity = self.config.sub_world_capacity;
        if self.sub_worlds.len() >= capacity {
            return Err(StrataError::SubWorldCapacity(capacity));
        }
        let id = i16::try_from(self.sub_worlds.len())
            .map(SubWorldId::new)
            .map_err(|_| StrataError::SubWorldCapacity(capacity))?;

        self.sub_worlds.push(SubWorld::new(id, K::NAME, &self.config));
        self.kinds.insert(kind, id);

        tracing::debug!(sub_world = K::NAME, id = id.get(), "registered sub world");
        Ok(id)
    }

    /// Returns the id of sub world kind `K`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredSubWorld`] if `K` is not registered.
    pub fn sub_world_id<K: SubWorldKind>(&self) -> StrataResult<SubWorldId> {
        self.kinds
            .get(&TypeId::of::<K>())
            .copied()
            .ok_or(StrataError::UnregisteredSubWorld(K::NAME))
    }

    /// Returns sub world `K`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredSubWorld`] if `K` is not registered.
    pub fn sub_world<K: SubWorldKind>(&self) -> StrataResult<&SubWorld> {
        let id = self.sub_world_id::<K>()?;
        self.sub_world_by_id(id)
    }

    /// Returns sub world `K` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnregisteredSubWorld`] if `K` is not registered.
    pub fn sub_world_mut<K: SubWorldKind>(&mut self) -> StrataResult<&mut SubWorld> {
        let id = self.sub_world_id::<K>()?;
        self.sub_world_by_id_mut(id)
    }

    /// Returns the sub world with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`] if no sub world has this id.
    pub fn sub_world_by_id(&self, id: SubWorldId) -> StrataResult<&SubWorld> {
        self.sub_worlds
            .get(id.index())
            .ok_or(StrataError::UnknownSubWorld(id.get()))
    }

    /// Returns the sub world with the given id mutably.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`] if no sub world has this id.
    pub fn sub_world_by_id_mut(&mut self, id: SubWorldId) -> StrataResult<&mut SubWorld> {
        self.sub_worlds
            .get_mut(id.index())
            .ok_or(StrataError::UnknownSubWorld(id.get()))
    }

    /// Returns the sub world that owns an identity.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`] if the identity's sub world id
    /// is out of range.
    pub fn sub_world_of(&self, id: EntityId) -> StrataResult<&SubWorld> {
        self.sub_world_by_id(SubWorldId::from(id))
    }

    fn sub_world_of_mut(&mut self, id: EntityId) -> StrataResult<&mut SubWorld> {
        self.sub_world_by_id_mut(SubWorldId::from(id))
    }

    /// Iterates over every sub world in id order.
    pub fn sub_worlds(&self) -> impl Iterator<Item = &SubWorld> + '_ {
        self.sub_worlds.iter()
    }

    /// Registers component `C` in sub world `K`.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnregisteredSubWorld`] if `K` is not registered
    /// - [`StrataError::DuplicateComponent`] if `C` already has a table there
    pub fn register_table<K: SubWorldKind, C: Component>(&mut self) -> StrataResult<TableHandle<C>> {
        self.sub_world_mut::<K>()?.register_table::<C>()
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Creates an entity in sub world `K`.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnregisteredSubWorld`] if `K` is not registered
    /// - [`StrataError::IdsExhausted`] or [`StrataError::SlotsExhausted`] when full
    pub fn create_entity<K: SubWorldKind>(&mut self) -> StrataResult<EntityId> {
        let id = self.sub_world_id::<K>()?;
        self.create_entity_in(id)
    }

    /// Creates an entity in the sub world with the given id.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnknownSubWorld`] if no sub world has this id
    /// - [`StrataError::IdsExhausted`] or [`StrataError::SlotsExhausted`] when full
    pub fn create_entity_in(&mut self, sub_world: SubWorldId) -> StrataResult<EntityId> {
        let global = self
            .last_global_id
            .checked_add(1)
            .ok_or(StrataError::IdsExhausted)?;

        let id = self.sub_world_by_id_mut(sub_world)?.create_entity(global)?;
        // Committed only once a slot was assigned.
        self.last_global_id = global;
        Ok(id)
    }

    /// Deletes an entity, detaching every component and recycling its slot.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnknownSubWorld`] if the identity's sub world id is out of range
    /// - [`StrataError::EntityNotFound`] if the identity is not live
    pub fn delete_entity(&mut self, id: EntityId) -> StrataResult<()> {
        self.sub_world_of_mut(id)?.delete_entity(id)
    }

    /// Checks if an identity is live.
    ///
    /// Identities naming an unknown sub world are not live.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.sub_world_of(id)
            .is_ok_and(|sub_world| sub_world.contains(id))
    }

    // =========================================================================
    // Component access, routed by the identity's sub world
    // =========================================================================

    /// Checks if a live entity carries component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`] or [`StrataError::UnregisteredComponent`].
    pub fn has<C: Component>(&self, id: EntityId) -> StrataResult<bool> {
        self.sub_world_of(id)?.has::<C>(id)
    }

    /// Gets a copy of component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`] or [`StrataError::UnregisteredComponent`].
    pub fn get<C: Component>(&self, id: EntityId) -> StrataResult<Option<C>> {
        self.sub_world_of(id)?.get::<C>(id)
    }

    /// Gets a mutable reference to component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`] or [`StrataError::UnregisteredComponent`].
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> StrataResult<Option<&mut C>> {
        self.sub_world_of_mut(id)?.get_mut::<C>(id)
    }

    /// Attaches or overwrites component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`], [`StrataError::UnregisteredComponent`]
    /// or [`StrataError::EntityNotFound`].
    pub fn set<C: Component>(&mut self, id: EntityId, component: C) -> StrataResult<()> {
        self.sub_world_of_mut(id)?.set(id, component)
    }

    /// Detaches component `C`. Returns `true` if it was attached.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownSubWorld`] or [`StrataError::UnregisteredComponent`].
    pub fn delete<C: Component>(&mut self, id: EntityId) -> StrataResult<bool> {
        self.sub_world_of_mut(id)?.delete::<C>(id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns a filter for shape `S` in sub world `K`.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnregisteredSubWorld`] if `K` is not registered
    /// - [`StrataError::UnregisteredComponent`] or [`StrataError::ConflictingShape`]
    ///   if the shape does not resolve
    pub fn when_all<K: SubWorldKind, S: FilterShape>(&mut self) -> StrataResult<Filter<S>> {
        let id = self.sub_world_id::<K>()?;
        let sub_world = self
            .sub_worlds
            .get_mut(id.index())
            .ok_or(StrataError::UnknownSubWorld(id.get()))?;
        sub_world.when_all::<S>(&mut self.pool)
    }

    pub(crate) fn query_parts(
        &mut self,
        id: SubWorldId,
    ) -> StrataResult<(&mut SubWorld, &mut ResourcePool)> {
        let sub_world = self
            .sub_worlds
            .get_mut(id.index())
            .ok_or(StrataError::UnknownSubWorld(id.get()))?;
        Ok((sub_world, &mut self.pool))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("sub_worlds", &self.sub_worlds)
            .field("last_global_id", &self.last_global_id)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

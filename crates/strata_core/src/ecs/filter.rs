//! # Filters
//!
//! A [`Filter`] is the runnable form of a filter shape. It owns no borrow of
//! the world: every run takes the world, re-resolves the bound columns from
//! the live tables and scans the sub world's registry.
//!
//! ## Column growth
//!
//! Tables are replaced by larger ones whenever their sub world's registry
//! grows. Every run binds the live columns afresh, so a run never reads a
//! replaced column. Columns are only reachable through a borrow of the
//! [`World`], so no table can grow while a run's columns are live.
//!
//! The growth stamp of every bound table is recorded only to count the runs
//! that found a grown table ([`Filter::rebinds`]). Binding does not depend on it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::descriptor::TypeDescriptor;
use super::entity::{EntityId, SubWorldId};
use super::shape::{FilterShape, Include};
use super::storage::Table;
use super::world::World;
use crate::error::{StrataError, StrataResult};
use crate::memory::{EntityList, Lease};

/// Runnable query for shape `S` in one sub world.
///
/// Created by [`World::when_all`] or [`SubWorld::when_all`](super::SubWorld::when_all).
///
/// # Example
///
/// ```rust,ignore
/// let mut movers = world.when_all::<Game, (Position, Velocity)>()?;
///
/// movers.for_each(&mut world, |_, (position, velocity)| {
///     position.x += velocity.dx;
///     position.y += velocity.dy;
/// })?;
/// ```
pub struct Filter<S: FilterShape> {
    descriptor: Arc<TypeDescriptor>,
    /// Growth stamp of each included table at the previous run.
    stamps: Vec<u64>,
    /// Number of runs that found a grown table. Diagnostic only.
    rebinds: u64,
    _shape: PhantomData<fn() -> S>,
}

impl<S: FilterShape> Filter<S> {
    pub(crate) fn new(descriptor: Arc<TypeDescriptor>, tables: &[Box<dyn Table>]) -> Self {
        let stamps = descriptor
            .include()
            .iter()
            .map(|binding| tables.get(binding.table()).map_or(0, |table| table.growth_version()))
            .collect();

        Self {
            descriptor,
            stamps,
            rebinds: 0,
            _shape: PhantomData,
        }
    }

    /// The resolved shape.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// The sub world this filter runs against.
    #[inline]
    #[must_use]
    pub fn sub_world(&self) -> SubWorldId {
        self.descriptor.sub_world()
    }

    /// Number of runs that found a bound table grown since the previous run.
    ///
    /// Columns are bound on every run whatever this count says.
    #[inline]
    #[must_use]
    pub const fn rebinds(&self) -> u64 {
        self.rebinds
    }

    /// Scans the sub world and binds the included columns.
    ///
    /// The returned iterator yields matching entities in ascending slot order,
    /// each with mutable references into the bound columns. Its scratch list is
    /// leased from the world's resource pool and handed back when it is dropped.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnknownSubWorld`] if the world has no such sub world
    /// - [`StrataError::FilterMismatch`] if the world's tables do not match the
    ///   tables this filter was resolved against
    pub fn matches<'w>(&mut self, world: &'w mut World) -> StrataResult<Matches<'w, S::Include>> {
        let (sub_world, pool) = world.query_parts(self.descriptor.sub_world())?;
        let (registry, tables) = sub_world.query_parts();

        self.descriptor.verify(tables)?;
        self.record_growth(tables);

        let mut entities = pool.entity_lists().lease(registry.len());
        self.descriptor.scan(registry, tables, |id| entities.push(id));

        let columns = <S::Include as Include>::bind(tables, self.descriptor.include()).ok_or(
            StrataError::FilterMismatch {
                shape: self.descriptor.shape(),
                sub_world: self.descriptor.sub_world().get(),
            },
        )?;

        Ok(Matches {
            entities,
            position: 0,
            next_slot: 0,
            columns,
        })
    }

    /// Calls `f` once per matching entity, in ascending slot order.
    ///
    /// The scratch list goes back to the pool on every exit path, including a
    /// panic inside `f`.
    ///
    /// # Errors
    ///
    /// Same as [`matches`](Self::matches).
    pub fn for_each<'w, F>(&mut self, world: &'w mut World, mut f: F) -> StrataResult<()>
    where
        F: FnMut(EntityId, <S::Include as Include>::Item<'w>),
    {
        for (id, item) in self.matches(world)? {
            f(id, item);
        }
        Ok(())
    }

    /// Replaces the contents of `out` with the matching entities.
    ///
    /// Returns the number of matches. No column is bound.
    ///
    /// # Errors
    ///
    /// Same as [`matches`](Self::matches).
    pub fn collect(&self, world: &World, out: &mut EntityList) -> StrataResult<usize> {
        let sub_world = world.sub_world_by_id(self.descriptor.sub_world())?;
        let tables = sub_world.tables();
        self.descriptor.verify(tables)?;

        out.clear();
        self.descriptor.scan(sub_world.registry(), tables, |id| out.push(id));
        Ok(out.len())
    }

    /// Counts the matching entities.
    ///
    /// # Errors
    ///
    /// Same as [`matches`](Self::matches).
    pub fn count(&self, world: &World) -> StrataResult<usize> {
        let sub_world = world.sub_world_by_id(self.descriptor.sub_world())?;
        let tables = sub_world.tables();
        self.descriptor.verify(tables)?;

        let mut count = 0;
        self.descriptor.scan(sub_world.registry(), tables, |_| count += 1);
        Ok(count)
    }

    fn record_growth(&mut self, tables: &[Box<dyn Table>]) {
        let mut grown = false;
        for (stamp, binding) in self.stamps.iter_mut().zip(self.descriptor.include()) {
            let current = tables
                .get(binding.table())
                .map_or(*stamp, |table| table.growth_version());
            if current != *stamp {
                *stamp = current;
                grown = true;
            }
        }

        if grown {
            self.rebinds += 1;
            tracing::trace!(
                shape = self.descriptor.shape(),
                rebinds = self.rebinds,
                "filter run found grown tables"
            );
        }
    }
}

impl<S: FilterShape> fmt::Debug for Filter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("shape", &self.descriptor.shape())
            .field("sub_world", &self.descriptor.sub_world())
            .field("rebinds", &self.rebinds)
            .finish_non_exhaustive()
    }
}

/// Iterator over the entities matched by one filter run.
///
/// Yields `(EntityId, (&mut C0, .., &mut Cn))`.
pub struct Matches<'w, I: Include> {
    entities: Lease<'w, EntityList>,
    /// Next index into `entities`.
    position: usize,
    /// Slot at the head of every column tail.
    next_slot: usize,
    columns: I::Columns<'w>,
}

impl<I: Include> Matches<'_, I> {
    /// Every matched entity, including the ones already yielded.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityList {
        &self.entities
    }
}

impl<'w, I: Include> Iterator for Matches<'w, I> {
    type Item = (EntityId, I::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.entities.get(self.position)?;
        self.position += 1;

        // Matches are in ascending slot order, so the tails only move forward.
        let slot = id.index();
        let skip = slot.checked_sub(self.next_slot)?;
        self.next_slot = slot + 1;

        let item = I::advance(&mut self.columns, skip)?;
        Some((id, item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entities.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl<I: Include> ExactSizeIterator for Matches<'_, I> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::ecs::{Component, Excluding, SubWorldKind};
    use bytemuck::{Pod, Zeroable};

    struct Game;
    impl SubWorldKind for Game {
        const NAME: &'static str = "Game";
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Heat(f32);
    impl Component for Heat {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Fuel(f32);
    impl Component for Fuel {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Inert(u8);
    impl Component for Inert {}

    fn world(capacity: usize) -> World {
        let config = WorldConfig {
            initial_entity_capacity: capacity,
            ..WorldConfig::default()
        };
        let mut world = World::with_config(config).unwrap();
        world.register_sub_world::<Game>().unwrap();
        world.register_table::<Game, Heat>().unwrap();
        world.register_table::<Game, Fuel>().unwrap();
        world.register_table::<Game, Inert>().unwrap();
        world
    }

    #[test]
    fn test_for_each_mutates_in_place() {
        let mut world = world(8);
        let burning = world.create_entity::<Game>().unwrap();
        world.set(burning, Heat(1.0)).unwrap();
        world.set(burning, Fuel(10.0)).unwrap();
        let cold = world.create_entity::<Game>().unwrap();
        world.set(cold, Fuel(3.0)).unwrap();

        let mut filter = world.when_all::<Game, (Heat, Fuel)>().unwrap();
        filter
            .for_each(&mut world, |_, (heat, fuel)| {
                heat.0 += 1.0;
                fuel.0 -= 1.0;
            })
            .unwrap();

        assert_eq!(world.get::<Heat>(burning).unwrap(), Some(Heat(2.0)));
        assert_eq!(world.get::<Fuel>(burning).unwrap(), Some(Fuel(9.0)));
        assert_eq!(world.get::<Fuel>(cold).unwrap(), Some(Fuel(3.0)));
        assert_eq!(world.pool().outstanding(), 0);
    }

    #[test]
    fn test_matches_skips_gaps() {
        let mut world = world(8);
        let mut odd = Vec::new();
        for n in 0_u8..6 {
            let id = world.create_entity::<Game>().unwrap();
            if n % 2 == 1 {
                world.set(id, Heat(f32::from(n))).unwrap();
                odd.push((id, f32::from(n)));
            }
        }

        let mut filter = world.when_all::<Game, (Heat,)>().unwrap();
        let seen: Vec<(EntityId, f32)> = filter
            .matches(&mut world)
            .unwrap()
            .map(|(id, (heat,))| (id, heat.0))
            .collect();
        assert_eq!(seen, odd);
    }

    #[test]
    fn test_collect_and_count() {
        let mut world = world(8);
        let a = world.create_entity::<Game>().unwrap();
        let b = world.create_entity::<Game>().unwrap();
        world.set(a, Heat(1.0)).unwrap();
        world.set(b, Heat(1.0)).unwrap();
        world.set(b, Inert(1)).unwrap();

        let filter = world
            .when_all::<Game, Excluding<(Heat,), (Inert,)>>()
            .unwrap();
        let mut out = EntityList::new();
        out.push(b);
        assert_eq!(filter.collect(&world, &mut out).unwrap(), 1);
        assert_eq!(out.as_slice(), &[a]);
        assert_eq!(filter.count(&world).unwrap(), 1);
    }

    #[test]
    fn test_rebind_after_growth() {
        let mut world = world(8);
        let mut filter = world.when_all::<Game, (Heat,)>().unwrap();
        for _ in 0..9 {
            let id = world.create_entity::<Game>().unwrap();
            world.set(id, Heat(2.0)).unwrap();
        }

        let mut visited = 0;
        filter
            .for_each(&mut world, |_, (heat,)| {
                assert_eq!(*heat, Heat(2.0));
                visited += 1;
            })
            .unwrap();
        assert_eq!(visited, 9);
        assert_eq!(filter.rebinds(), 1);

        filter.for_each(&mut world, |_, _| {}).unwrap();
        assert_eq!(filter.rebinds(), 1);
    }

    #[test]
    fn test_binding_is_fresh_without_growth() {
        let mut world = world(8);
        let a = world.create_entity::<Game>().unwrap();
        world.set(a, Heat(1.0)).unwrap();

        let mut filter = world.when_all::<Game, (Heat,)>().unwrap();
        filter.for_each(&mut world, |_, (heat,)| heat.0 = 5.0).unwrap();

        // Written between runs, inside the current capacity.
        world.set(a, Heat(7.0)).unwrap();
        let b = world.create_entity::<Game>().unwrap();
        world.set(b, Heat(2.0)).unwrap();

        let mut seen = Vec::new();
        filter
            .for_each(&mut world, |id, (heat,)| seen.push((id, heat.0)))
            .unwrap();
        assert_eq!(seen, vec![(a, 7.0), (b, 2.0)]);
        assert_eq!(filter.rebinds(), 0);
        assert_eq!(
            world.sub_world::<Game>().unwrap().table::<Heat>().unwrap().growth_version(),
            0
        );
    }

    #[test]
    fn test_filter_from_another_world_is_rejected() {
        let mut source = world(8);
        let mut filter = source.when_all::<Game, (Heat,)>().unwrap();

        let mut other = World::new();
        other.register_sub_world::<Game>().unwrap();
        other.register_table::<Game, Fuel>().unwrap();
        other.register_table::<Game, Heat>().unwrap();

        assert!(matches!(
            filter.matches(&mut other),
            Err(StrataError::FilterMismatch { .. })
        ));
    }

    #[test]
    fn test_size_hint() {
        let mut world = world(8);
        for _ in 0..3 {
            let id = world.create_entity::<Game>().unwrap();
            world.set(id, Fuel(1.0)).unwrap();
        }
        let mut filter = world.when_all::<Game, (Fuel,)>().unwrap();
        let mut matches = filter.matches(&mut world).unwrap();
        assert_eq!(matches.len(), 3);
        assert!(matches.next().is_some());
        assert_eq!(matches.len(), 2);
        assert_eq!(matches.entities().len(), 3);
    }
}

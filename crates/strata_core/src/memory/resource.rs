//! # Resource Pool
//!
//! The world-owned arena of scratch objects. Each world has its own, so
//! worlds stay independent of each other and of test ordering.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::entity_list::EntityList;
use super::pool::{IndexSet, Pool, Reusable};
use crate::config::WorldConfig;

/// Object-safe view of a pool of any element type.
trait AnyPool {
    fn outstanding(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Reusable> AnyPool for Pool<T> {
    fn outstanding(&self) -> usize {
        Pool::outstanding(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Lend/return pools for entity lists, index sets and typed value lists.
///
/// # Example
///
/// ```rust
/// use strata_core::memory::ResourcePool;
///
/// let mut pool = ResourcePool::default();
/// {
///     let mut scratch = pool.lists::<f32>().lease(64);
///     scratch.push(1.5);
/// }
/// assert_eq!(pool.outstanding(), 0);
/// ```
pub struct ResourcePool {
    /// Query result buffers.
    entity_lists: Pool<EntityList>,
    /// Dedup sets used while resolving filter shapes.
    index_sets: Pool<IndexSet>,
    /// One `Pool<Vec<T>>` per element type, keyed by `TypeId::of::<Vec<T>>()`.
    lists: HashMap<TypeId, Box<dyn AnyPool>>,
    /// Leak warning threshold shared by every pool.
    leak_threshold: usize,
}

impl ResourcePool {
    /// Creates empty pools sized from the configuration.
    #[must_use]
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            entity_lists: Pool::new(config.entity_list_capacity, config.leak_warning_threshold),
            index_sets: Pool::new(0, config.leak_warning_threshold),
            lists: HashMap::new(),
            leak_threshold: config.leak_warning_threshold,
        }
    }

    /// Pool of entity lists.
    #[inline]
    pub fn entity_lists(&mut self) -> &mut Pool<EntityList> {
        &mut self.entity_lists
    }

    /// Pool of small index sets.
    #[inline]
    pub fn index_sets(&mut self) -> &mut Pool<IndexSet> {
        &mut self.index_sets
    }

    /// Pool of `Vec<T>` value lists, created on first use.
    pub fn lists<T: 'static>(&mut self) -> &mut Pool<Vec<T>> {
        let leak_threshold = self.leak_threshold;
        let pool = self
            .lists
            .entry(TypeId::of::<Vec<T>>())
            .or_insert_with(|| Box::new(Pool::<Vec<T>>::new(0, leak_threshold)));

        let Some(pool) = pool.as_any_mut().downcast_mut::<Pool<Vec<T>>>() else {
            unreachable!("value list pools are keyed by their own TypeId")
        };
        pool
    }

    /// Total number of objects currently lent out across every pool.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.entity_lists.outstanding()
            + self.index_sets.outstanding()
            + self.lists.values().map(|pool| pool.outstanding()).sum::<usize>()
    }
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::new(&WorldConfig::default())
    }
}

impl fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("entity_lists", &self.entity_lists)
            .field("index_sets", &self.index_sets)
            .field("value_list_kinds", &self.lists.len())
            .field("leak_threshold", &self.leak_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_lists_are_typed() {
        let mut pool = ResourcePool::default();

        let (h_f32, floats) = pool.lists::<f32>().lend(4);
        let (h_u8, bytes) = pool.lists::<u8>().lend(4);
        assert_eq!(pool.outstanding(), 2);

        pool.lists::<f32>().give_back(h_f32, floats).unwrap();
        pool.lists::<u8>().give_back(h_u8, bytes).unwrap();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.lists::<f32>().available(), 1);
    }

    #[test]
    fn test_entity_list_double_return() {
        let mut pool = ResourcePool::default();
        let (handle, list) = pool.entity_lists().lend(8);
        pool.entity_lists().give_back(handle, list).unwrap();

        let err = pool
            .entity_lists()
            .give_back(handle, EntityList::new())
            .unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_entity_list_default_capacity() {
        let config = WorldConfig {
            entity_list_capacity: 32,
            ..WorldConfig::default()
        };
        let mut pool = ResourcePool::new(&config);
        let list = pool.entity_lists().lease(0);
        assert!(list.capacity() >= 32);
    }
}

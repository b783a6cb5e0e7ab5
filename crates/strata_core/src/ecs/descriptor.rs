//! # Type Descriptors
//!
//! The resolved form of a filter shape: the dense table index of every
//! included and excluded component in one sub world.
//!
//! Resolution happens once per shape and sub world. The scan itself runs on
//! every query and is never cached.

use std::any::TypeId;
use std::collections::HashMap;

use super::entity::{EntityId, SubWorldId};
use super::registry::EntitySlotRegistry;
use super::shape::{ComponentInfo, ComponentSet, FilterShape};
use super::storage::Table;
use crate::error::{StrataError, StrataResult};
use crate::memory::IndexSet;

/// One component of a resolved shape and the table that stores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    table: usize,
    component: TypeId,
    name: &'static str,
}

impl Binding {
    pub(crate) const fn new(table: usize, info: ComponentInfo) -> Self {
        Self {
            table,
            component: info.type_id,
            name: info.name,
        }
    }

    /// Dense table index in the sub world.
    #[inline]
    #[must_use]
    pub const fn table(&self) -> usize {
        self.table
    }

    /// `TypeId` of the component.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> TypeId {
        self.component
    }

    /// Name of the component.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Cached resolution of one filter shape against one sub world.
#[derive(Debug)]
pub struct TypeDescriptor {
    shape: &'static str,
    sub_world: SubWorldId,
    /// Included components, in declaration order. Their columns are bound.
    include: Vec<Binding>,
    /// Excluded components.
    exclude: Vec<Binding>,
}

impl TypeDescriptor {
    /// Resolves shape `S` against a sub world's table registry.
    ///
    /// `seen` is scratch space for duplicate detection and is left cleared.
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnregisteredComponent`] if the shape names a component
    ///   with no table in the sub world
    /// - [`StrataError::ConflictingShape`] if a component is named twice, or is
    ///   both included and excluded
    pub(crate) fn resolve<S: FilterShape>(
        sub_world: SubWorldId,
        sub_world_name: &'static str,
        type_index: &HashMap<TypeId, usize>,
        seen: &mut IndexSet,
    ) -> StrataResult<Self> {
        let shape = S::name();
        let resolved = Self::bind_sets::<S>(shape, sub_world_name, type_index, seen);
        seen.clear();
        let (include, exclude) = resolved?;

        tracing::debug!(
            shape,
            sub_world = sub_world_name,
            include = include.len(),
            exclude = exclude.len(),
            "resolved filter shape"
        );

        Ok(Self {
            shape,
            sub_world,
            include,
            exclude,
        })
    }

    fn bind_sets<S: FilterShape>(
        shape: &'static str,
        sub_world_name: &'static str,
        type_index: &HashMap<TypeId, usize>,
        seen: &mut IndexSet,
    ) -> StrataResult<(Vec<Binding>, Vec<Binding>)> {
        let mut components = Vec::with_capacity(
            <S::Include as ComponentSet>::LEN.max(<S::Exclude as ComponentSet>::LEN),
        );

        <S::Include as ComponentSet>::describe(&mut components);
        let include = Self::bind_all(shape, sub_world_name, &components, type_index, seen)?;

        components.clear();
        <S::Exclude as ComponentSet>::describe(&mut components);
        let exclude = Self::bind_all(shape, sub_world_name, &components, type_index, seen)?;

        Ok((include, exclude))
    }

    fn bind_all(
        shape: &'static str,
        sub_world_name: &'static str,
        components: &[ComponentInfo],
        type_index: &HashMap<TypeId, usize>,
        seen: &mut IndexSet,
    ) -> StrataResult<Vec<Binding>> {
        components
            .iter()
            .map(|info| {
                let table = *type_index.get(&info.type_id).ok_or(
                    StrataError::UnregisteredComponent {
                        component: info.name,
                        sub_world: sub_world_name,
                    },
                )?;
                if !seen.insert(table) {
                    return Err(StrataError::ConflictingShape {
                        shape,
                        component: info.name,
                    });
                }
                Ok(Binding::new(table, *info))
            })
            .collect()
    }

    /// Name of the resolved shape.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        self.shape
    }

    /// The sub world the shape was resolved against.
    #[inline]
    #[must_use]
    pub const fn sub_world(&self) -> SubWorldId {
        self.sub_world
    }

    /// Included components, in declaration order.
    #[inline]
    #[must_use]
    pub fn include(&self) -> &[Binding] {
        &self.include
    }

    /// Excluded components.
    #[inline]
    #[must_use]
    pub fn exclude(&self) -> &[Binding] {
        &self.exclude
    }

    /// Checks one slot against the include and exclude sets.
    ///
    /// A table whose presence bitset is shorter than the slot reads as absent.
    /// The first missing include ends the check.
    #[inline]
    #[must_use]
    pub fn matches_slot(&self, tables: &[Box<dyn Table>], slot: usize) -> bool {
        let present = |binding: &Binding| {
            tables
                .get(binding.table)
                .is_some_and(|table| table.contains_slot(slot))
        };
        self.include.iter().all(present) && !self.exclude.iter().any(present)
    }

    /// Visits every live entity that matches, in ascending slot order.
    ///
    /// The walk stops once `registry.len()` live slots have been seen.
    pub fn scan(
        &self,
        registry: &EntitySlotRegistry,
        tables: &[Box<dyn Table>],
        mut visit: impl FnMut(EntityId),
    ) {
        let identities = registry.identities();
        for slot in registry.occupied().ones().take(registry.len()) {
            if self.matches_slot(tables, slot) {
                visit(identities[slot]);
            }
        }
    }

    /// Checks that every binding still points at a table of the right type.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::FilterMismatch`] otherwise.
    pub(crate) fn verify(&self, tables: &[Box<dyn Table>]) -> StrataResult<()> {
        let consistent = self.include.iter().chain(&self.exclude).all(|binding| {
            tables
                .get(binding.table)
                .is_some_and(|table| table.component_type() == binding.component)
        });
        if consistent {
            Ok(())
        } else {
            Err(StrataError::FilterMismatch {
                shape: self.shape,
                sub_world: self.sub_world.get(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::shape::Excluding;
    use crate::ecs::{Component, ComponentTable};
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct A(u32);
    impl Component for A {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct B(u32);
    impl Component for B {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct C(u32);
    impl Component for C {}

    fn type_index() -> HashMap<TypeId, usize> {
        HashMap::from([(TypeId::of::<A>(), 0), (TypeId::of::<B>(), 1), (TypeId::of::<C>(), 2)])
    }

    fn resolve<S: FilterShape>() -> StrataResult<TypeDescriptor> {
        let mut seen = IndexSet::new();
        let descriptor = TypeDescriptor::resolve::<S>(SubWorldId::new(0), "Test", &type_index(), &mut seen);
        assert!(seen.is_empty());
        descriptor
    }

    fn id(global: i32, slot: i16) -> EntityId {
        EntityId::new(global, slot, 0)
    }

    #[test]
    fn test_resolve_indices() {
        let descriptor = resolve::<Excluding<(C, A), (B,)>>().unwrap();
        let include: Vec<usize> = descriptor.include().iter().map(Binding::table).collect();
        let exclude: Vec<usize> = descriptor.exclude().iter().map(Binding::table).collect();
        assert_eq!(include, vec![2, 0]);
        assert_eq!(exclude, vec![1]);
    }

    #[test]
    fn test_resolve_rejects_duplicates() {
        let err = resolve::<(A, A)>().unwrap_err();
        assert!(matches!(err, StrataError::ConflictingShape { .. }));

        let err = resolve::<Excluding<(A, B), (A,)>>().unwrap_err();
        assert!(matches!(err, StrataError::ConflictingShape { .. }));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_resolve_rejects_unregistered() {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
        #[repr(C)]
        struct Unknown(u8);
        impl Component for Unknown {}

        let err = resolve::<(A, Unknown)>().unwrap_err();
        assert!(matches!(
            err,
            StrataError::UnregisteredComponent { sub_world: "Test", .. }
        ));
    }

    #[test]
    fn test_scan_include_exclude() {
        let mut registry = EntitySlotRegistry::new(8);
        let mut a: ComponentTable<A> = ComponentTable::new(8);
        let mut b: ComponentTable<B> = ComponentTable::new(8);
        // Left short on purpose: slots past its end read as absent.
        let mut c: ComponentTable<C> = ComponentTable::new(2);

        let (e1, e2, e3, e4) = (id(1, 0), id(2, 1), id(3, 2), id(4, 5));
        for e in [e1, e2, e3, e4] {
            registry.add(e);
            a.set(e, A(1));
        }
        for e in [e1, e3, e4] {
            b.set(e, B(1));
        }
        c.set(e3, C(1));
        assert!(c.capacity() <= e4.index());
        let tables: Vec<Box<dyn Table>> = vec![Box::new(a), Box::new(b), Box::new(c)];

        let both = resolve::<(A, B)>().unwrap();
        let mut out = Vec::new();
        both.scan(&registry, &tables, |e| out.push(e));
        assert_eq!(out, vec![e1, e3, e4]);

        let without_c = resolve::<Excluding<(A, B), (C,)>>().unwrap();
        out.clear();
        without_c.scan(&registry, &tables, |e| out.push(e));
        assert_eq!(out, vec![e1, e4]);
    }

    #[test]
    fn test_verify_detects_foreign_tables() {
        let descriptor = resolve::<(A, B)>().unwrap();
        let swapped: Vec<Box<dyn Table>> = vec![
            Box::new(ComponentTable::<B>::new(1)),
            Box::new(ComponentTable::<A>::new(1)),
        ];
        assert!(matches!(
            descriptor.verify(&swapped),
            Err(StrataError::FilterMismatch { sub_world: 0, .. })
        ));

        let short: Vec<Box<dyn Table>> = vec![Box::new(ComponentTable::<A>::new(1))];
        assert!(descriptor.verify(&short).is_err());
    }
}

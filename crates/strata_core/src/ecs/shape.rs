//! # Filter Shapes
//!
//! A filter shape declares which components an entity must carry and which it
//! must not. Shapes are plain types, resolved once per sub world into a
//! [`TypeDescriptor`](super::TypeDescriptor) and cached.
//!
//! - A tuple of 1 to 5 components is a shape with no exclusions
//! - [`Excluding<I, E>`] adds an exclusion set to a tuple shape
//! - Any type can be a named shape by implementing [`FilterShape`]
//!
//! ```rust,ignore
//! struct Movers;
//!
//! impl FilterShape for Movers {
//!     type Include = (Position, Velocity);
//!     type Exclude = (Frozen,);
//! }
//! ```

use std::any::TypeId;
use std::marker::PhantomData;

use super::component::Component;
use super::descriptor::Binding;
use super::storage::{ComponentTable, Table};

/// Static description of one component type in a shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    /// `TypeId` of the component.
    pub type_id: TypeId,
    /// Name used in errors and logs.
    pub name: &'static str,
}

impl ComponentInfo {
    /// Describes component `C`.
    #[inline]
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: C::name(),
        }
    }
}

/// A fixed set of component types: the unit type or a tuple of up to five.
pub trait ComponentSet: 'static {
    /// Number of components in the set.
    const LEN: usize;

    /// Appends a description of every component, in declaration order.
    fn describe(out: &mut Vec<ComponentInfo>);
}

/// A component set whose columns a query binds for in-place access.
///
/// `Columns` holds the not-yet-visited tail of every bound column and `Item`
/// is one row of mutable references taken from those tails.
pub trait Include: ComponentSet {
    /// Tail slices of the bound columns.
    type Columns<'a>;

    /// One matched row.
    type Item<'a>;

    /// Borrows the value column of every table named in `bindings`.
    ///
    /// Returns `None` if a binding points at a missing table or a table of
    /// the wrong component type.
    fn bind<'a>(tables: &'a mut [Box<dyn Table>], bindings: &[Binding]) -> Option<Self::Columns<'a>>;

    /// Skips `skip` rows of every column and splits off the next one.
    fn advance<'a>(columns: &mut Self::Columns<'a>, skip: usize) -> Option<Self::Item<'a>>;
}

/// A declared query: components that must be present and components that must not.
pub trait FilterShape: 'static {
    /// Components every matching entity carries. Their columns are bound.
    type Include: Include;

    /// Components no matching entity carries.
    type Exclude: ComponentSet;

    /// Name used in errors and logs.
    #[must_use]
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shape adapter adding the exclusion set `E` to the include set `I`.
///
/// ```rust,ignore
/// let filter = world.when_all::<Game, Excluding<(Position, Velocity), (Frozen,)>>()?;
/// ```
pub struct Excluding<I, E>(PhantomData<fn() -> (I, E)>);

impl<I: Include, E: ComponentSet> FilterShape for Excluding<I, E> {
    type Include = I;
    type Exclude = E;
}

impl ComponentSet for () {
    const LEN: usize = 0;

    fn describe(_out: &mut Vec<ComponentInfo>) {}
}

macro_rules! impl_shape_tuple {
    ($len:literal; $($name:ident $idx:tt),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            const LEN: usize = $len;

            fn describe(out: &mut Vec<ComponentInfo>) {
                $(out.push(ComponentInfo::of::<$name>());)+
            }
        }

        impl<$($name: Component),+> Include for ($($name,)+) {
            type Columns<'a> = ($(&'a mut [$name],)+);
            type Item<'a> = ($(&'a mut $name,)+);

            fn bind<'a>(
                tables: &'a mut [Box<dyn Table>],
                bindings: &[Binding],
            ) -> Option<Self::Columns<'a>> {
                // One pass hands out disjoint borrows of the bound tables.
                let mut picked: [Option<&'a mut Box<dyn Table>>; $len] =
                    std::array::from_fn(|_| None);
                for (index, table) in tables.iter_mut().enumerate() {
                    if let Some(position) = bindings.iter().position(|b| b.table() == index) {
                        if let Some(pick) = picked.get_mut(position) {
                            *pick = Some(table);
                        }
                    }
                }

                Some(($(
                    picked[$idx]
                        .take()?
                        .as_any_mut()
                        .downcast_mut::<ComponentTable<$name>>()?
                        .raw_values_mut(),
                )+))
            }

            fn advance<'a>(columns: &mut Self::Columns<'a>, skip: usize) -> Option<Self::Item<'a>> {
                Some(($(
                    {
                        let column = std::mem::take(&mut columns.$idx);
                        let (item, rest) = column.get_mut(skip..)?.split_first_mut()?;
                        columns.$idx = rest;
                        item
                    },
                )+))
            }
        }

        impl<$($name: Component),+> FilterShape for ($($name,)+) {
            type Include = Self;
            type Exclude = ();
        }
    };
}

impl_shape_tuple!(1; A 0);
impl_shape_tuple!(2; A 0, B 1);
impl_shape_tuple!(3; A 0, B 1, C 2);
impl_shape_tuple!(4; A 0, B 1, C 2, D 3);
impl_shape_tuple!(5; A 0, B 1, C 2, D 3, E 4);

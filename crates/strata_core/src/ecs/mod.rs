//! # Entity Component Storage
//!
//! Columnar entity storage partitioned into independent sub worlds, with a
//! small declarative query language over component presence.
//!
//! ## Design Philosophy
//!
//! - Components live in slot-indexed columns with a presence bitset per table
//! - Entity identities pack a global id, a recyclable slot and a sub world id
//! - Filter shapes are resolved once per sub world and cached
//! - Queries borrow their scratch space from the world's resource pool

mod component;
mod descriptor;
mod entity;
mod filter;
mod registry;
mod shape;
mod storage;
mod sub_world;
mod world;

pub use component::Component;
pub use descriptor::{Binding, TypeDescriptor};
pub use entity::{EntityId, SubWorldId};
pub use filter::{Filter, Matches};
pub use registry::{EntitySlotRegistry, SlotCursor};
pub use shape::{ComponentInfo, ComponentSet, Excluding, FilterShape, Include};
pub use storage::{ComponentTable, Table, TableHandle};
pub use sub_world::{DirectComponents, SubWorld, SubWorldKind};
pub use world::World;

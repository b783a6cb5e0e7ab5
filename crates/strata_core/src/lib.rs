//! # STRATA Core
//!
//! In-memory entity/component storage and query engine:
//! - Typed plain-data components attached to packed entity identities
//! - Independent sub worlds, each with its own slots and tables
//! - Allocation-free include/exclude queries over component presence
//!
//! ## Architecture Rules
//!
//! 1. **Single logical thread per world** - nothing here synchronizes internally
//! 2. **Columnar storage** - one value column and presence bitset per component
//! 3. **Resolve once, scan every time** - filter shapes are cached, scans are not
//!
//! ## Example
//!
//! ```rust
//! use bytemuck::{Pod, Zeroable};
//! use strata_core::{Component, StrataResult, SubWorldKind, World};
//!
//! #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
//! #[repr(C)]
//! struct Position { x: f32, y: f32 }
//! impl Component for Position {}
//!
//! #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
//! #[repr(C)]
//! struct Velocity { dx: f32, dy: f32 }
//! impl Component for Velocity {}
//!
//! struct Game;
//! impl SubWorldKind for Game {
//!     const NAME: &'static str = "Game";
//! }
//!
//! fn main() -> StrataResult<()> {
//!     let mut world = World::new();
//!     world.register_sub_world::<Game>()?;
//!     world.register_table::<Game, Position>()?;
//!     world.register_table::<Game, Velocity>()?;
//!
//!     let e = world.create_entity::<Game>()?;
//!     world.set(e, Position { x: 0.0, y: 0.0 })?;
//!     world.set(e, Velocity { dx: 1.0, dy: 1.0 })?;
//!
//!     let mut movers = world.when_all::<Game, (Position, Velocity)>()?;
//!     movers.for_each(&mut world, |_, (position, velocity)| {
//!         position.x += velocity.dx;
//!         position.y += velocity.dy;
//!     })?;
//!
//!     assert_eq!(world.get::<Position>(e)?, Some(Position { x: 1.0, y: 1.0 }));
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::WorldConfig;
pub use ecs::{
    Binding, Component, ComponentInfo, ComponentSet, ComponentTable, DirectComponents,
    EntityId, EntitySlotRegistry, Excluding, Filter, FilterShape, Include, Matches,
    SlotCursor, SubWorld, SubWorldId, SubWorldKind, Table, TableHandle, TypeDescriptor, World,
};
pub use error::{StrataError, StrataResult};
pub use memory::{EntityList, IndexSet, Lease, Pool, PoolHandle, Reusable, ResourcePool};

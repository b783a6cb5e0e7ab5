//! # Memory Management
//!
//! Lend/return pools that keep queries free of per-call allocation.
//!
//! ## Design Philosophy
//!
//! Scratch objects are allocated on first use and then recycled:
//! - A lent object is either handed back explicitly or through a [`Lease`] guard
//! - Handing the same object back twice is an error, never silent corruption
//! - Every world owns its own pools

mod entity_list;
mod pool;
mod resource;

pub use entity_list::EntityList;
pub use pool::{IndexSet, Lease, Pool, PoolHandle, Reusable};
pub use resource::ResourcePool;

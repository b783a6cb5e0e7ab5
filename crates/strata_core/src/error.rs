//! # Error Types
//!
//! All errors that can occur while storing and querying entities.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors that can occur in the entity/component core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrataError {
    /// The identity's slot is empty, out of range, or holds a different entity.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The slot registry changed structurally while a cursor was walking it.
    #[error("entity registry modified during iteration (cursor version {expected}, registry version {found})")]
    ConcurrentModification {
        /// Version the cursor was created against.
        expected: u64,
        /// Version the registry had when the change was detected.
        found: u64,
    },

    /// A component type was used before `register_table` was called for it.
    #[error("component {component} is not registered in sub world {sub_world}")]
    UnregisteredComponent {
        /// Name of the component type.
        component: &'static str,
        /// Name of the sub world.
        sub_world: &'static str,
    },

    /// A component type was registered twice in the same sub world.
    #[error("component {component} is already registered in sub world {sub_world}")]
    DuplicateComponent {
        /// Name of the component type.
        component: &'static str,
        /// Name of the sub world.
        sub_world: &'static str,
    },

    /// A filter shape names the same component more than once.
    #[error("filter shape {shape} names component {component} more than once")]
    ConflictingShape {
        /// Name of the filter shape.
        shape: &'static str,
        /// Name of the repeated component type.
        component: &'static str,
    },

    /// A filter was run against tables that do not match its descriptor.
    #[error("filter shape {shape} does not match the tables of sub world {sub_world}")]
    FilterMismatch {
        /// Name of the filter shape.
        shape: &'static str,
        /// Id of the sub world the filter was run against.
        sub_world: i16,
    },

    /// No sub world is registered under this id.
    #[error("sub world {0} is not registered")]
    UnknownSubWorld(i16),

    /// No sub world is registered for this kind.
    #[error("sub world kind {0} is not registered")]
    UnregisteredSubWorld(&'static str),

    /// The sub world kind was registered twice.
    #[error("sub world kind {0} is already registered")]
    DuplicateSubWorld(&'static str),

    /// The world cannot hold more sub worlds.
    #[error("sub world capacity {0} exhausted")]
    SubWorldCapacity(usize),

    /// Every 16-bit slot of the sub world is occupied.
    #[error("sub world {0} has no free entity slots")]
    SlotsExhausted(&'static str),

    /// The 32-bit global id counter has run out.
    #[error("global entity id space exhausted")]
    IdsExhausted,

    /// A pooled item was handed back while it was not on loan.
    #[error("{kind} returned to pool twice (pool slot {index})")]
    PoolDoubleReturn {
        /// Name of the pooled type.
        kind: &'static str,
        /// Pool slot the handle points at.
        index: u32,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StrataError {
    /// Returns `true` for errors that indicate a wiring or pool-discipline bug
    /// in the caller rather than a runtime condition.
    ///
    /// Identity and capacity errors are the only recoverable kinds.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            Self::EntityNotFound(_)
                | Self::ConcurrentModification { .. }
                | Self::SlotsExhausted(_)
                | Self::IdsExhausted
                | Self::SubWorldCapacity(_)
        )
    }
}

/// Result type for core operations.
pub type StrataResult<T> = Result<T, StrataError>;

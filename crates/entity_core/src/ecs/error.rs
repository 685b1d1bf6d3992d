//! Errors reported by the entity runtime
//!
//! None of these are environment failures: they describe a call that was not
//! legal for the current state. The state is left untouched when one is
//! returned.

use thiserror::Error;

use super::component::{ComponentState, Transition};
use super::entity::EntityState;
use crate::foundation::HashedName;

/// Result alias for runtime operations
pub type EcsResult<T> = Result<T, EcsError>;

/// Entity runtime errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Lifecycle transition not legal from the current component state
    #[error("cannot {requested:?} a component in state {from:?}")]
    InvalidTransition {
        /// State the component was in
        from: ComponentState,
        /// Transition that was asked for
        requested: Transition,
    },

    /// Entity-level operation not legal from the current entity state
    #[error("operation `{operation}` not allowed while entity is {state:?}")]
    InvalidEntityState {
        /// State the entity was in
        state: EntityState,
        /// Operation that was asked for
        operation: &'static str,
    },

    /// Attachment requested on an entity without a root spatial component
    #[error("entity is not a spatial entity (no root spatial component)")]
    NotSpatialEntity,

    /// Attachment would make a node its own ancestor
    #[error("attachment would create a cycle in the spatial hierarchy")]
    AttachmentCycle,

    /// Entity id does not resolve (never existed or already evicted)
    #[error("unknown entity")]
    UnknownEntity,

    /// Component id does not resolve on this entity
    #[error("unknown component")]
    UnknownComponent,

    /// System key does not resolve on this owner
    #[error("unknown system")]
    UnknownSystem,

    /// Spatial components need a node in the world's hierarchy
    #[error("spatial components must be created through the world")]
    SpatialRequiresWorld,

    /// Spatial handle refers to a removed node
    #[error("stale spatial handle")]
    StaleSpatialHandle,

    /// Second instance of a max-one-per-entity component type
    #[error("entity already holds a component of type `{0}`")]
    DuplicateComponent(&'static str),

    /// Second instance of a system kind on the same owner
    #[error("system `{0}` is already registered on this owner")]
    DuplicateSystem(&'static str),

    /// A by-name construction named a type that is not registered
    #[error("no type registered under {0}")]
    UnknownType(HashedName),
}

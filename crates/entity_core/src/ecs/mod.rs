//! Entity-Component-System runtime
//!
//! Entities own components and local systems, the world owns entities,
//! world systems and the spatial hierarchy. Both scopes run their systems
//! through per-stage priority lists.

pub mod alive;
pub mod component;
pub mod component_set;
pub mod entity;
pub mod error;
pub mod registry;
pub mod requests;
pub mod scheduler;
pub mod spatial;
pub mod system;
pub mod world;

#[cfg(test)]
mod tests;

pub use alive::{Alive, REMOVAL_GRACE_TICKS};
pub use component::{Component, ComponentHandle, ComponentId, ComponentSlot, ComponentState, LoadStatus, Transition};
pub use component_set::ComponentSet;
pub use entity::{Entity, EntityId, EntityState, Guid};
pub use error::{EcsError, EcsResult};
pub use registry::{
    ComponentType, ComponentTypeRegistry, Descriptor, EntitySystemRegistry, EntitySystemType, Registries, Registry,
    WorldSystemRegistry, WorldSystemType,
};
pub use requests::RequestedComponents;
pub use scheduler::{EntitySystemUpdate, StageRequests, UpdateSchedule, UpdateStage, WorldSystemUpdate};
pub use spatial::{SpatialComponent, SpatialHandle, SpatialHierarchy, SpatialNode, SPATIAL_COMPONENT};
pub use system::{EntityContext, EntitySystem, EntitySystemKey, WorldContext, WorldSystem, WorldSystemKey};
pub use world::World;

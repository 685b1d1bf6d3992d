//! # Entity Core
//!
//! Runtime for composing game objects out of independently loadable
//! components and scheduling the systems that operate on them.
//!
//! ## Features
//!
//! - **Components**: load/initialize state machine with asynchronous loads
//! - **Registries**: components and systems constructible by name
//! - **Stage Scheduling**: per-stage priority lists at entity and world scope
//! - **Spatial Hierarchy**: generational arena of transform nodes with cross-entity attachment
//! - **Deferred Destruction**: killed entities and components linger for a fixed grace window
//! - **Parallel Updates**: entities updated in attachment-depth waves on a worker pool
//!
//! ## Quick Start
//!
//! ```rust
//! use entity_core::prelude::*;
//!
//! #[derive(Default)]
//! struct Health(u32);
//! impl Component for Health {}
//!
//! let mut registries = Registries::new();
//! registries.components.add(ComponentType::of::<Health>("health", true));
//!
//! let mut world = World::new(WorldConfig::sequential());
//! let player = world.create_entity("player");
//! let health = world.create_component(&registries, player, "health", "hp").unwrap();
//! world.load_entity(player).unwrap();
//! world.activate_entity(player).unwrap();
//!
//! world.run_frame();
//! assert!(world.component::<Health>(player, health).is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod ecs;
pub mod foundation;

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, WorldConfig},
        ecs::{
            Component, ComponentHandle, ComponentId, ComponentState, ComponentType, EcsError, EcsResult, Entity,
            EntityContext, EntityId, EntitySystem, EntitySystemType, LoadStatus, Registries, RequestedComponents,
            SpatialComponent, SpatialHandle, StageRequests, UpdateStage, World, WorldContext, WorldSystem,
            WorldSystemType,
        },
        foundation::{
            math::{Mat4, Obb, Transform, Vec3},
            HashedName,
        },
    };
}

//! System traits and their update contexts
//!
//! Entity systems live inside one entity and only ever see that entity's
//! components. World systems live in the world and track components of many
//! entities at once. Both learn about components through added/removed
//! callbacks and keep the handles, so updates go straight to the data.

use parking_lot::{RwLock, RwLockReadGuard};
use slotmap::SlotMap;

use super::component::{AsAny, Component, ComponentHandle, ComponentId, ComponentSlot};
use super::component_set::ComponentSet;
use super::entity::{Entity, EntityId, Guid};
use super::error::{EcsError, EcsResult};
use super::requests::RequestedComponents;
use super::scheduler::{StageRequests, UpdateStage};
use super::spatial::{SpatialComponent, SpatialHandle, SpatialHierarchy};
use crate::foundation::math::{Mat4, Obb};

slotmap::new_key_type! {
    /// Key of a system inside its entity
    pub struct EntitySystemKey;

    /// Key of a system inside the world
    pub struct WorldSystemKey;
}

/// Logic operating on the components of a single entity
pub trait EntitySystem: AsAny + Send + Sync + 'static {
    /// Kind name, at most one system per name on an entity
    fn name(&self) -> &'static str;

    /// Component kinds this system operates on
    fn component_requests(&self) -> RequestedComponents {
        RequestedComponents::new()
    }

    /// Stages and priorities to run in while attached
    fn register_updates(&self, requests: &mut StageRequests);

    /// A matching component became available
    fn component_was_added(&mut self, _component: ComponentHandle) {}

    /// A previously added component is going away
    fn component_was_removed(&mut self, _component: ComponentHandle) {}

    /// Run for one stage
    fn update(&mut self, stage: UpdateStage, context: &mut EntityContext<'_>);
}

impl dyn EntitySystem {
    /// Downcast to a concrete system
    pub fn downcast_ref<T: EntitySystem>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete system
    pub fn downcast_mut<T: EntitySystem>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Logic operating on global state or on components across entities
pub trait WorldSystem: AsAny + Send + Sync + 'static {
    /// Kind name, at most one system per name in a world
    fn name(&self) -> &'static str;

    /// Component kinds this system tracks
    fn component_requests(&self) -> RequestedComponents {
        RequestedComponents::new()
    }

    /// Stages and priorities to run in
    fn register_updates(&self, requests: &mut StageRequests);

    /// The system was added to a world
    fn system_was_added_to_world(&mut self) {}

    /// The system is being removed from its world
    fn system_was_removed_from_world(&mut self) {}

    /// A matching component of `entity` became available
    fn component_was_added(&mut self, _entity: EntityId, _component: ComponentHandle) {}

    /// A previously added component of `entity` is going away
    fn component_was_removed(&mut self, _entity: EntityId, _component: ComponentHandle) {}

    /// Run for one stage
    fn update(&mut self, stage: UpdateStage, context: &mut WorldContext<'_>);
}

impl dyn WorldSystem {
    /// Downcast to a concrete system
    pub fn downcast_ref<T: WorldSystem>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete system
    pub fn downcast_mut<T: WorldSystem>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// What an entity system sees during its update
///
/// The spatial hierarchy is shared with entities updating on other threads.
/// Reads see every node; writes are limited to the entity's own spatial
/// components. Drop a read guard before setting a transform.
pub struct EntityContext<'a> {
    pub(crate) guid: Guid,
    pub(crate) components: &'a mut ComponentSet,
    pub(crate) spatial: &'a RwLock<SpatialHierarchy>,
}

impl<'a> EntityContext<'a> {
    /// Guid of the entity being updated
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// Component slot by id
    pub fn slot(&self, id: ComponentId) -> Option<&ComponentSlot> {
        self.components.get(id)
    }

    /// Component by id, as a concrete kind
    pub fn component<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.components.component::<T>(id)
    }

    /// Mutable component by id, as a concrete kind
    pub fn component_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.components.component_mut::<T>(id)
    }

    /// Whether the component was killed and is waiting for removal
    pub fn is_dying(&self, id: ComponentId) -> bool {
        self.components.is_dying(id)
    }

    /// Hierarchy node behind a spatial component
    pub fn spatial_handle(&self, id: ComponentId) -> Option<SpatialHandle> {
        self.component::<SpatialComponent>(id).map(SpatialComponent::handle)
    }

    /// Shared access to the spatial hierarchy
    pub fn spatial(&self) -> RwLockReadGuard<'_, SpatialHierarchy> {
        self.spatial.read()
    }

    /// Move one of the entity's spatial components, updating its subtree
    pub fn set_local_transform(&self, id: ComponentId, transform: Mat4) -> EcsResult<()> {
        let handle = self.spatial_handle(id).ok_or(EcsError::UnknownComponent)?;
        self.spatial.write().set_local_transform(handle, transform)
    }

    /// Resize one of the entity's spatial components
    pub fn set_local_bounds(&self, id: ComponentId, bounds: Obb) -> EcsResult<()> {
        let handle = self.spatial_handle(id).ok_or(EcsError::UnknownComponent)?;
        self.spatial.write().set_local_bounds(handle, bounds)
    }
}

/// What a world system sees during its update
pub struct WorldContext<'a> {
    pub(crate) entities: &'a mut SlotMap<EntityId, Entity>,
    pub(crate) spatial: &'a mut SpatialHierarchy,
}

impl<'a> WorldContext<'a> {
    /// Entity by id
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable entity by id
    ///
    /// Component changes made here reach world systems at the start of the
    /// next stage.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// All entities, dying ones included
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Component of an entity, as a concrete kind
    pub fn component<T: Component>(&self, entity: EntityId, id: ComponentId) -> Option<&T> {
        self.entities.get(entity)?.component::<T>(id)
    }

    /// Mutable component of an entity, as a concrete kind
    pub fn component_mut<T: Component>(&mut self, entity: EntityId, id: ComponentId) -> Option<&mut T> {
        self.entities.get_mut(entity)?.component_mut::<T>(id)
    }

    /// The spatial hierarchy
    pub fn spatial(&self) -> &SpatialHierarchy {
        self.spatial
    }

    /// The spatial hierarchy, for moving and resizing nodes
    ///
    /// Links between entities are changed through
    /// [`World::attach`](super::World::attach) and [`World::detach`](super::World::detach).
    pub fn spatial_mut(&mut self) -> &mut SpatialHierarchy {
        self.spatial
    }
}

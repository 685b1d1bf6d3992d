//! Entity: a bundle of components plus the local systems driving them
//!
//! An entity goes through `Unloaded -> Loaded -> Activated` and back. Loading
//! loads and initializes its components. Activation binds components to the
//! local systems that request them and puts attached systems into the local
//! scheduler. The world takes care of world systems and spatial attachment.

use std::fmt;

use parking_lot::RwLock;
use slotmap::SlotMap;
use uuid::Uuid;

use super::alive::Alive;
use super::component::{Component, ComponentHandle, ComponentId, ComponentSlot, ComponentState};
use super::component_set::ComponentSet;
use super::error::{EcsError, EcsResult};
use super::registry::{ComponentType, Descriptor, Registries};
use super::requests::{Binding, RequestedComponents};
use super::scheduler::{EntitySystemUpdate, StageRequests, UpdateStage};
use super::spatial::{SpatialComponent, SpatialHandle, SpatialHierarchy, SPATIAL_COMPONENT};
use super::system::{EntityContext, EntitySystem, EntitySystemKey};
use crate::foundation::HashedName;

slotmap::new_key_type! {
    /// Generational id of an entity inside its world
    pub struct EntityId;
}

/// Globally unique entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(Uuid);

impl Guid {
    /// Generate a random guid
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// All-zero guid
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Underlying uuid
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Components are not loaded
    Unloaded,
    /// Components are loaded, systems are not bound
    Loaded,
    /// Components are bound to systems and updating
    Activated,
}

struct LocalSystem {
    system: Box<dyn EntitySystem>,
    requests: RequestedComponents,
    stages: StageRequests,
    binding: Binding,
    scheduled: bool,
}

/// Owned bundle of components, local systems and their scheduler
pub struct Entity {
    guid: Guid,
    name: String,
    components: ComponentSet,
    systems: SlotMap<EntitySystemKey, LocalSystem>,
    schedule: EntitySystemUpdate,
    root_component: Option<ComponentId>,
    spatial_parent: Option<EntityId>,
    state: EntityState,
    alive: Alive,
    membership_dirty: bool,
    hierarchy_changed: bool,
}

impl Entity {
    /// Create an unloaded entity with a fresh guid
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_guid(Guid::new(), name)
    }

    /// Create an unloaded entity with a known guid
    pub fn with_guid(guid: Guid, name: impl Into<String>) -> Self {
        Self {
            guid,
            name: name.into(),
            components: ComponentSet::new(),
            systems: SlotMap::with_key(),
            schedule: EntitySystemUpdate::new(),
            root_component: None,
            spatial_parent: None,
            state: EntityState::Unloaded,
            alive: Alive::new(),
            membership_dirty: false,
            hierarchy_changed: false,
        }
    }

    /// Globally unique id
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lifecycle state
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Whether components are bound and updating
    pub fn is_activated(&self) -> bool {
        self.state == EntityState::Activated
    }

    /// Deferred destruction counter
    pub fn alive(&self) -> &Alive {
        &self.alive
    }

    /// Whether the entity was killed and waits for eviction
    pub fn is_pending_removal(&self) -> bool {
        self.alive.is_pending_removal()
    }

    /// Request removal; the world evicts the entity once the grace window is over
    pub fn kill(&mut self) {
        if !self.alive.is_pending_removal() {
            log::debug!("Entity '{}' killed", self.name);
        }
        self.alive.kill();
    }

    // ---- components ----

    /// Component storage
    pub fn components(&self) -> &ComponentSet {
        &self.components
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

    /// Add a component
    ///
    /// On a loaded or activated entity the component is loaded right away and
    /// bound once it is initialized. Spatial components need a node in the
    /// world's hierarchy and go through
    /// [`World::add_spatial_component`](super::World::add_spatial_component).
    pub fn add_component(
        &mut self,
        component_type: &ComponentType,
        name: impl Into<String>,
        component: Box<dyn Component>,
    ) -> EcsResult<ComponentId> {
        if component_type.kind() == SPATIAL_COMPONENT {
            log::warn!("Spatial component added to entity '{}' outside of its world", self.name);
            return Err(EcsError::SpatialRequiresWorld);
        }
        self.insert_component(component_type, name.into(), component)
    }

    /// Add a component of a registered kind, built by its factory
    pub fn create_component(
        &mut self,
        registries: &Registries,
        kind: &str,
        name: impl Into<String>,
    ) -> EcsResult<ComponentId> {
        let component_type = registries
            .components
            .from_name(kind)
            .ok_or_else(|| EcsError::UnknownType(HashedName::new(kind)))?;
        self.add_component(&component_type, name, component_type.create())
    }

    /// Start the removal countdown of a component
    ///
    /// The component keeps its bindings until it is evicted at the end of the
    /// grace window.
    pub fn kill_component(&mut self, id: ComponentId) -> EcsResult<()> {
        self.components.kill(id)
    }

    /// `Initialized -> Loaded` on request, unbinding the component from systems
    ///
    /// The component keeps its resources and can be initialized again.
    pub fn shutdown_component(&mut self, id: ComponentId) -> EcsResult<()> {
        self.components
            .get_mut(id)
            .ok_or(EcsError::UnknownComponent)?
            .shutdown()?;
        self.membership_changed();
        Ok(())
    }

    /// `Loaded -> Initialized` for a component that was shut down
    pub fn initialize_component(&mut self, id: ComponentId) -> EcsResult<()> {
        self.components
            .get_mut(id)
            .ok_or(EcsError::UnknownComponent)?
            .initialize()?;
        self.membership_changed();
        Ok(())
    }

    pub(crate) fn insert_spatial(&mut self, name: String, component: SpatialComponent) -> EcsResult<ComponentId> {
        let id = self.insert_component(&SpatialComponent::component_type(), name, Box::new(component))?;
        if self.root_component.is_none() {
            self.root_component = Some(id);
        }
        Ok(id)
    }

    fn insert_component(
        &mut self,
        component_type: &ComponentType,
        name: String,
        component: Box<dyn Component>,
    ) -> EcsResult<ComponentId> {
        if component_type.max_one_per_entity() && self.components.live_count_of(component_type.kind()) > 0 {
            log::warn!(
                "Entity '{}' already holds a '{}' component",
                self.name,
                component_type.name()
            );
            return Err(EcsError::DuplicateComponent(component_type.name()));
        }
        let id = self.components.insert(component_type, name, component);
        if self.state != EntityState::Unloaded {
            self.load_component(id)?;
        }
        self.membership_changed();
        Ok(id)
    }

    fn load_component(&mut self, id: ComponentId) -> EcsResult<()> {
        let Some(slot) = self.components.get_mut(id) else {
            return Err(EcsError::UnknownComponent);
        };
        if slot.state() == ComponentState::Unloaded && slot.load()? == ComponentState::Loaded {
            slot.initialize()?;
        }
        Ok(())
    }

    // ---- spatial ----

    /// Whether the entity has a root spatial component
    pub fn is_spatial_entity(&self) -> bool {
        self.root_component.is_some()
    }

    /// Root spatial component
    pub fn root_component(&self) -> Option<ComponentId> {
        self.root_component
    }

    /// Hierarchy node of the root spatial component
    pub fn root_handle(&self) -> Option<SpatialHandle> {
        self.spatial_handle(self.root_component?)
    }

    /// Hierarchy node behind a spatial component
    pub fn spatial_handle(&self, id: ComponentId) -> Option<SpatialHandle> {
        self.components
            .component::<SpatialComponent>(id)
            .map(SpatialComponent::handle)
    }

    /// Attachment to establish when the entity is activated
    pub fn spatial_parent(&self) -> Option<EntityId> {
        self.spatial_parent
    }

    /// Record the entity to attach to on activation
    pub fn set_spatial_parent(&mut self, parent: Option<EntityId>) {
        self.spatial_parent = parent;
    }

    // ---- systems ----

    /// Add a local system, at most one per system name
    pub fn add_system(&mut self, system: Box<dyn EntitySystem>) -> EcsResult<EntitySystemKey> {
        let name = system.name();
        if self.find_system(name).is_some() {
            log::warn!("Entity '{}' already has system '{}'", self.name, name);
            return Err(EcsError::DuplicateSystem(name));
        }
        let mut stages = StageRequests::new();
        system.register_updates(&mut stages);
        let requests = system.component_requests();
        let key = self.systems.insert(LocalSystem {
            system,
            requests,
            stages,
            binding: Binding::default(),
            scheduled: false,
        });
        log::debug!("Added system '{}' to entity '{}'", name, self.name);
        self.sync_local_systems();
        Ok(key)
    }

    /// Add a local system of a registered kind
    pub fn add_system_by_name(&mut self, registries: &Registries, name: &str) -> EcsResult<EntitySystemKey> {
        let system_type = registries
            .entity_systems
            .from_name(name)
            .ok_or_else(|| EcsError::UnknownType(HashedName::new(name)))?;
        self.add_system(system_type.create())
    }

    /// Remove a local system, unbinding everything it was bound to first
    pub fn remove_system(&mut self, key: EntitySystemKey) -> EcsResult<Box<dyn EntitySystem>> {
        let mut local = self.systems.remove(key).ok_or(EcsError::UnknownSystem)?;
        for component in local.binding.clear() {
            local.system.component_was_removed(component);
        }
        self.schedule.remove_all(key);
        Ok(local.system)
    }

    /// Key of the system with the given name
    pub fn find_system(&self, name: &str) -> Option<EntitySystemKey> {
        self.systems
            .iter()
            .find(|(_, local)| local.system.name() == name)
            .map(|(key, _)| key)
    }

    /// Local system as a concrete kind
    pub fn system<T: EntitySystem>(&self, key: EntitySystemKey) -> Option<&T> {
        self.systems.get(key)?.system.downcast_ref::<T>()
    }

    /// Mutable local system as a concrete kind
    pub fn system_mut<T: EntitySystem>(&mut self, key: EntitySystemKey) -> Option<&mut T> {
        self.systems.get_mut(key)?.system.downcast_mut::<T>()
    }

    /// Whether the system is attached and in the local scheduler
    pub fn is_system_scheduled(&self, key: EntitySystemKey) -> bool {
        self.systems.get(key).is_some_and(|local| local.scheduled)
    }

    /// Local scheduler
    pub fn schedule(&self) -> &EntitySystemUpdate {
        &self.schedule
    }

    // ---- lifecycle ----

    /// Load every component, initializing the ones that finish right away
    pub fn load(&mut self) -> EcsResult<()> {
        if self.state != EntityState::Unloaded {
            return Err(self.reject("load"));
        }
        let ids = self.components.ids().to_vec();
        for id in ids {
            self.load_component(id)?;
        }
        self.state = EntityState::Loaded;
        log::debug!("Entity '{}' loaded", self.name);
        Ok(())
    }

    /// Bind components to local systems and start updating
    pub fn activate(&mut self) -> EcsResult<()> {
        if self.state != EntityState::Loaded {
            return Err(self.reject("activate"));
        }
        self.state = EntityState::Activated;
        self.membership_changed();
        log::debug!("Entity '{}' activated", self.name);
        Ok(())
    }

    /// Unbind every local system and stop updating
    pub fn deactive(&mut self) -> EcsResult<()> {
        if self.state != EntityState::Activated {
            return Err(self.reject("deactive"));
        }
        self.state = EntityState::Loaded;
        self.membership_changed();
        log::debug!("Entity '{}' deactivated", self.name);
        Ok(())
    }

    /// Unload every component
    pub fn unload(&mut self) -> EcsResult<()> {
        match self.state {
            EntityState::Activated => return Err(self.reject("unload")),
            EntityState::Unloaded => return Ok(()),
            EntityState::Loaded => {}
        }
        let ids = self.components.ids().to_vec();
        for id in ids {
            if let Some(slot) = self.components.get_mut(id) {
                slot.unload();
            }
        }
        self.state = EntityState::Unloaded;
        log::debug!("Entity '{}' unloaded", self.name);
        Ok(())
    }

    /// Run one stage
    ///
    /// `StartFrame` first polls pending loads. `EndFrame` finally advances the
    /// entity's own alive counter and sweeps its components.
    pub fn update(&mut self, stage: UpdateStage, spatial: &RwLock<SpatialHierarchy>) {
        if stage == UpdateStage::StartFrame && self.state != EntityState::Unloaded {
            self.poll_pending_loads();
        }

        let Self {
            guid,
            name,
            components,
            systems,
            schedule,
            ..
        } = self;
        let mut context = EntityContext {
            guid: *guid,
            components,
            spatial,
        };
        for key in schedule.iter(stage) {
            if let Some(local) = systems.get_mut(key) {
                log::trace!("{} [{}] {}", name, stage, local.system.name());
                local.system.update(stage, &mut context);
            }
        }

        if stage == UpdateStage::EndFrame {
            self.alive.update_for_frame();
            self.sweep_components(spatial);
        }
    }

    fn poll_pending_loads(&mut self) {
        let loading: Vec<ComponentId> = self
            .components
            .iter()
            .filter(|slot| slot.state() == ComponentState::Loading)
            .map(ComponentSlot::id)
            .collect();
        let mut initialized = false;
        for id in loading {
            if let Some(slot) = self.components.get_mut(id) {
                if slot.poll_load() == Ok(ComponentState::Loaded) {
                    initialized |= slot.initialize().is_ok();
                }
            }
        }
        if initialized {
            self.membership_changed();
        }
    }

    fn sweep_components(&mut self, spatial: &RwLock<SpatialHierarchy>) {
        let evicted = self.components.tick_alive_and_sweep();
        if evicted.is_empty() {
            return;
        }
        self.membership_changed();

        for mut slot in evicted {
            if let Some(handle) = slot.get::<SpatialComponent>().map(SpatialComponent::handle) {
                if spatial.write().remove(handle).is_err() {
                    log::debug!("Spatial node of '{}' was already removed", slot.name());
                }
                self.hierarchy_changed = true;
            }
            if self.root_component == Some(slot.id()) {
                self.root_component = self
                    .components
                    .live()
                    .find(|live| live.kind() == SPATIAL_COMPONENT)
                    .map(ComponentSlot::id);
            }
            slot.unload();
            log::debug!("Evicted component '{}' from entity '{}'", slot.name(), self.name);
        }
    }

    /// Bring local bindings and the local scheduler in line with the component set
    fn sync_local_systems(&mut self) {
        let activated = self.is_activated();
        let candidates = if activated {
            self.components.candidates()
        } else {
            Vec::new()
        };

        for (key, local) in &mut self.systems {
            let (removed, added) = if activated {
                let diff = local.binding.sync(&local.requests, &candidates);
                (diff.removed, diff.added)
            } else {
                (local.binding.clear(), Vec::new())
            };
            for component in removed {
                local.system.component_was_removed(component);
            }
            for component in added {
                local.system.component_was_added(component);
            }

            let attached = activated && local.binding.is_attached();
            if attached && !local.scheduled {
                self.schedule.add_requests(key, &local.stages);
                local.scheduled = true;
            } else if !attached && local.scheduled {
                self.schedule.remove_all(key);
                local.scheduled = false;
            }
        }
    }

    fn membership_changed(&mut self) {
        self.sync_local_systems();
        self.membership_dirty = true;
    }

    fn reject(&self, operation: &'static str) -> EcsError {
        log::warn!(
            "Rejected `{}` on entity '{}' in state {:?}",
            operation, self.name, self.state
        );
        EcsError::InvalidEntityState {
            state: self.state,
            operation,
        }
    }

    /// Components world systems may bind to
    pub(crate) fn world_candidates(&self) -> Vec<ComponentHandle> {
        if self.is_activated() {
            self.components.candidates()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn take_membership_dirty(&mut self) -> bool {
        std::mem::take(&mut self.membership_dirty)
    }

    pub(crate) fn take_hierarchy_changed(&mut self) -> bool {
        std::mem::take(&mut self.hierarchy_changed)
    }

    /// Deactivate, unload and drop every component, removing spatial nodes
    pub(crate) fn teardown(&mut self, spatial: &mut SpatialHierarchy) {
        if self.is_activated() {
            self.state = EntityState::Loaded;
            self.sync_local_systems();
        }
        for mut slot in self.components.drain() {
            if let Some(handle) = slot.get::<SpatialComponent>().map(SpatialComponent::handle) {
                // Nodes of attached children become roots
                if spatial.remove(handle).is_err() {
                    log::debug!("Spatial node of '{}' was already removed", slot.name());
                }
            }
            slot.unload();
        }
        self.root_component = None;
        self.state = EntityState::Unloaded;
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("guid", &self.guid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("components", &self.components.len())
            .field("systems", &self.systems.len())
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{LoadStatus, Transition};
    use crate::ecs::registry::EntitySystemType;

    #[derive(Default)]
    struct Mesh;
    impl Component for Mesh {}

    #[derive(Default)]
    struct Animation {
        time: f32,
    }
    impl Component for Animation {}

    /// Loads over two frames
    #[derive(Default)]
    struct Streamed {
        polls: u32,
    }
    impl Component for Streamed {
        fn on_load(&mut self) -> LoadStatus {
            LoadStatus::Pending
        }
        fn poll_load(&mut self) -> LoadStatus {
            self.polls += 1;
            if self.polls >= 2 {
                LoadStatus::Loaded
            } else {
                LoadStatus::Pending
            }
        }
    }

    /// Advances every bound animation and records callbacks
    #[derive(Default)]
    struct Animator {
        bound: Vec<ComponentHandle>,
        events: Vec<(&'static str, HashedName)>,
        updates: u32,
    }

    impl EntitySystem for Animator {
        fn name(&self) -> &'static str {
            "animator"
        }
        fn component_requests(&self) -> RequestedComponents {
            RequestedComponents::new().require("animation").optional("mesh")
        }
        fn register_updates(&self, requests: &mut StageRequests) {
            requests.add(UpdateStage::BeforePhysics, 0);
        }
        fn component_was_added(&mut self, component: ComponentHandle) {
            self.events.push(("added", component.kind));
            self.bound.push(component);
        }
        fn component_was_removed(&mut self, component: ComponentHandle) {
            self.events.push(("removed", component.kind));
            self.bound.retain(|c| *c != component);
        }
        fn update(&mut self, _stage: UpdateStage, context: &mut EntityContext<'_>) {
            self.updates += 1;
            for handle in &self.bound {
                if let Some(animation) = context.component_mut::<Animation>(handle.id) {
                    animation.time += 0.5;
                }
            }
        }
    }

    fn create_animator() -> Box<dyn EntitySystem> {
        Box::<Animator>::default()
    }

    fn added(kind: &str) -> (&'static str, HashedName) {
        ("added", HashedName::new(kind))
    }

    fn removed(kind: &str) -> (&'static str, HashedName) {
        ("removed", HashedName::new(kind))
    }

    fn mesh_type() -> ComponentType {
        ComponentType::of::<Mesh>("mesh", true)
    }

    fn animation_type() -> ComponentType {
        ComponentType::of::<Animation>("animation", false)
    }

    fn frame(entity: &mut Entity, spatial: &RwLock<SpatialHierarchy>) {
        for stage in UpdateStage::ALL {
            entity.update(stage, spatial);
        }
    }

    fn animator(entity: &Entity, key: EntitySystemKey) -> &Animator {
        entity.system::<Animator>(key).expect("animator")
    }

    #[test]
    fn test_lifecycle_preconditions() {
        let mut entity = Entity::new("crate");
        assert!(matches!(
            entity.activate(),
            Err(EcsError::InvalidEntityState { state: EntityState::Unloaded, operation: "activate" })
        ));

        entity.load().expect("load");
        assert!(entity.load().is_err());
        entity.activate().expect("activate");
        assert!(entity.unload().is_err());
        assert_eq!(entity.state(), EntityState::Activated);

        entity.deactive().expect("deactive");
        entity.unload().expect("unload");
        assert_eq!(entity.state(), EntityState::Unloaded);
    }

    #[test]
    fn test_max_one_per_entity() {
        let mut entity = Entity::new("crate");
        entity.add_component(&mesh_type(), "mesh", Box::new(Mesh)).expect("first");
        assert_eq!(
            entity.add_component(&mesh_type(), "mesh 2", Box::new(Mesh)),
            Err(EcsError::DuplicateComponent("mesh"))
        );
        assert_eq!(entity.components().len(), 1);

        // Not limited
        entity.add_component(&animation_type(), "a", Box::new(Animation::default())).expect("a");
        entity.add_component(&animation_type(), "b", Box::new(Animation::default())).expect("b");
        assert_eq!(entity.components().len(), 3);
    }

    #[test]
    fn test_spatial_components_need_the_world() {
        let mut entity = Entity::new("crate");
        let result = entity.add_component(
            &SpatialComponent::component_type(),
            "root",
            Box::new(SpatialComponent::default()),
        );
        assert_eq!(result, Err(EcsError::SpatialRequiresWorld));
        assert!(!entity.is_spatial_entity());
    }

    #[test]
    fn test_load_initializes_components() {
        let mut entity = Entity::new("crate");
        let mesh = entity.add_component(&mesh_type(), "mesh", Box::new(Mesh)).expect("mesh");
        assert_eq!(entity.slot(mesh).map(ComponentSlot::state), Some(ComponentState::Unloaded));

        entity.load().expect("load");
        assert_eq!(entity.slot(mesh).map(ComponentSlot::state), Some(ComponentState::Initialized));

        // Added after load: loaded right away
        let late = entity
            .add_component(&animation_type(), "late", Box::new(Animation::default()))
            .expect("late");
        assert_eq!(entity.slot(late).map(ComponentSlot::state), Some(ComponentState::Initialized));
    }

    #[test]
    fn test_activation_binds_and_schedules() {
        let spatial = RwLock::new(SpatialHierarchy::new());
        let mut entity = Entity::new("character");
        let key = entity.add_system(Box::<Animator>::default()).expect("system");
        let animation = entity
            .add_component(&animation_type(), "walk", Box::new(Animation::default()))
            .expect("animation");
        entity.add_component(&mesh_type(), "body", Box::new(Mesh)).expect("mesh");
        entity.load().expect("load");

        // Loaded but not activated: nothing bound, nothing scheduled
        assert!(animator(&entity, key).events.is_empty());
        assert!(!entity.is_system_scheduled(key));

        entity.activate().expect("activate");
        assert_eq!(animator(&entity, key).events, vec![added("animation"), added("mesh")]);
        assert!(entity.is_system_scheduled(key));

        frame(&mut entity, &spatial);
        assert_eq!(animator(&entity, key).updates, 1);
        assert_eq!(entity.component::<Animation>(animation).map(|a| a.time), Some(0.5));

        entity.deactive().expect("deactive");
        assert_eq!(
            animator(&entity, key).events[2..].to_vec(),
            vec![removed("animation"), removed("mesh")]
        );
        assert!(!entity.is_system_scheduled(key));
        frame(&mut entity, &spatial);
        assert_eq!(animator(&entity, key).updates, 1);
    }

    #[test]
    fn test_missing_requirement_keeps_system_idle() {
        let spatial = RwLock::new(SpatialHierarchy::new());
        let mut entity = Entity::new("statue");
        let key = entity.add_system(Box::<Animator>::default()).expect("system");
        entity.add_component(&mesh_type(), "body", Box::new(Mesh)).expect("mesh");
        entity.load().expect("load");
        entity.activate().expect("activate");

        frame(&mut entity, &spatial);
        assert!(animator(&entity, key).events.is_empty());
        assert_eq!(animator(&entity, key).updates, 0);

        // Requirement shows up later
        entity
            .add_component(&animation_type(), "idle", Box::new(Animation::default()))
            .expect("animation");
        assert_eq!(animator(&entity, key).events, vec![added("mesh"), added("animation")]);
        assert!(entity.is_system_scheduled(key));
    }

    #[test]
    fn test_killed_component_unbinds_at_eviction() {
        let spatial = RwLock::new(SpatialHierarchy::new());
        let mut entity = Entity::new("character");
        let key = entity.add_system(Box::<Animator>::default()).expect("system");
        let animation = entity
            .add_component(&animation_type(), "walk", Box::new(Animation::default()))
            .expect("animation");
        entity.load().expect("load");
        entity.activate().expect("activate");

        entity.kill_component(animation).expect("kill");
        for _ in 0..9 {
            frame(&mut entity, &spatial);
            assert!(entity.components().is_dying(animation));
            assert!(entity.is_system_scheduled(key));
        }
        assert_eq!(animator(&entity, key).updates, 9);

        frame(&mut entity, &spatial);
        assert!(!entity.components().contains(animation));
        assert_eq!(animator(&entity, key).events, vec![added("animation"), removed("animation")]);
        assert!(!entity.is_system_scheduled(key));
    }

    #[test]
    fn test_pending_load_binds_when_complete() {
        let spatial = RwLock::new(SpatialHierarchy::new());
        let streamed_type = ComponentType::of::<Streamed>("streamed", false);
        let mut entity = Entity::new("streaming");
        let id = entity.add_component(&streamed_type, "texture", Box::<Streamed>::default()).expect("add");
        entity.load().expect("load");
        entity.activate().expect("activate");
        assert_eq!(entity.slot(id).map(ComponentSlot::state), Some(ComponentState::Loading));
        assert!(entity.components().candidates().is_empty());

        frame(&mut entity, &spatial);
        assert_eq!(entity.slot(id).map(ComponentSlot::state), Some(ComponentState::Loading));

        frame(&mut entity, &spatial);
        assert_eq!(entity.slot(id).map(ComponentSlot::state), Some(ComponentState::Initialized));
        assert_eq!(entity.components().candidates().len(), 1);
    }

    #[test]
    fn test_systems_by_name_and_duplicates() {
        let mut registries = Registries::new();
        registries
            .entity_systems
            .add(EntitySystemType::new("animator", create_animator));

        let mut entity = Entity::new("character");
        let key = entity.add_system_by_name(&registries, "animator").expect("by name");
        assert_eq!(entity.find_system("animator"), Some(key));
        assert_eq!(
            entity.add_system(Box::<Animator>::default()).err(),
            Some(EcsError::DuplicateSystem("animator"))
        );
        assert_eq!(
            entity.add_system_by_name(&registries, "missing").err(),
            Some(EcsError::UnknownType(HashedName::new("missing")))
        );

        let removed = entity.remove_system(key).expect("remove");
        assert_eq!(removed.name(), "animator");
        assert_eq!(entity.remove_system(key).err(), Some(EcsError::UnknownSystem));
    }

    #[test]
    fn test_guid() {
        assert_ne!(Guid::new(), Guid::new());
        assert!(Guid::nil().as_uuid().is_nil());
        let entity = Entity::with_guid(Guid::nil(), "fixed");
        assert_eq!(entity.guid(), Guid::nil());
    }

    #[test]
    fn test_shutdown_on_request_unbinds_until_initialized() {
        let mut entity = Entity::new("character");
        let key = entity.add_system(Box::<Animator>::default()).expect("system");
        let animation = entity
            .add_component(&animation_type(), "walk", Box::new(Animation::default()))
            .expect("animation");
        entity.load().expect("load");
        entity.activate().expect("activate");

        entity.shutdown_component(animation).expect("shutdown");
        assert_eq!(entity.slot(animation).map(ComponentSlot::state), Some(ComponentState::Loaded));
        assert_eq!(animator(&entity, key).events, vec![added("animation"), removed("animation")]);
        assert!(!entity.is_system_scheduled(key));

        assert!(matches!(
            entity.shutdown_component(animation),
            Err(EcsError::InvalidTransition { from: ComponentState::Loaded, requested: Transition::Shutdown })
        ));

        entity.initialize_component(animation).expect("initialize");
        assert_eq!(animator(&entity, key).events[2..].to_vec(), vec![added("animation")]);
        assert!(entity.is_system_scheduled(key));
        assert!(matches!(
            entity.initialize_component(animation),
            Err(EcsError::InvalidTransition { from: ComponentState::Initialized, requested: Transition::Initialize })
        ));
        assert_eq!(entity.shutdown_component(ComponentId::default()), Err(EcsError::UnknownComponent));
    }
}

//! World: owner of entities, the spatial hierarchy and world systems
//!
//! The host calls [`World::update`] once per stage, in stage order, every
//! frame. Each call updates all entities and then runs the world systems
//! scheduled in that stage.
//!
//! Entities are updated in waves by attachment depth. Entities without a
//! parent entity form wave 0, their attached children wave 1 and so on. A
//! wave starts only after the previous one finished, so a child always sees
//! its parent's update of the same stage. Inside a wave entities run on the
//! world's worker pool unless parallel updates are disabled.

use parking_lot::{RwLock, RwLockReadGuard};
use rayon::prelude::*;
use slotmap::{SecondaryMap, SlotMap};

use super::component::{Component, ComponentHandle, ComponentId};
use super::entity::{Entity, EntityId, EntityState};
use super::error::{EcsError, EcsResult};
use super::registry::{ComponentType, Registries};
use super::requests::{Binding, RequestedComponents};
use super::scheduler::{StageRequests, UpdateStage, WorldSystemUpdate};
use super::spatial::{SpatialComponent, SpatialHandle, SpatialHierarchy, SPATIAL_COMPONENT};
use super::system::{WorldContext, WorldSystem, WorldSystemKey};
use crate::config::WorldConfig;
use crate::foundation::math::{Mat4, Obb};
use crate::foundation::HashedName;

struct GlobalSystem {
    system: Box<dyn WorldSystem>,
    requests: RequestedComponents,
    bindings: SecondaryMap<EntityId, Binding>,
}

impl GlobalSystem {
    fn sync_entity(&mut self, entity: EntityId, candidates: &[ComponentHandle]) {
        if candidates.is_empty() && !self.bindings.contains_key(entity) {
            return;
        }
        let Some(binding) = self.bindings.entry(entity).map(|entry| entry.or_default()) else {
            return;
        };
        let diff = binding.sync(&self.requests, candidates);
        let unbound = binding.bound().is_empty();
        for component in diff.removed {
            self.system.component_was_removed(entity, component);
        }
        for component in diff.added {
            self.system.component_was_added(entity, component);
        }
        if unbound {
            self.bindings.remove(entity);
        }
    }

    fn unbind_entity(&mut self, entity: EntityId) {
        if let Some(mut binding) = self.bindings.remove(entity) {
            for component in binding.clear() {
                self.system.component_was_removed(entity, component);
            }
        }
    }
}

/// Entities, spatial hierarchy, world systems and the frame driver
pub struct World {
    config: WorldConfig,
    entities: SlotMap<EntityId, Entity>,
    dying: Vec<EntityId>,
    spatial: RwLock<SpatialHierarchy>,
    systems: SlotMap<WorldSystemKey, GlobalSystem>,
    schedule: WorldSystemUpdate,
    depths: SecondaryMap<EntityId, usize>,
    wave_count: usize,
    waves_dirty: bool,
    waves_generation: u64,
    pool: Option<rayon::ThreadPool>,
    frame: u64,
}

impl World {
    /// Create an empty world
    pub fn new(config: WorldConfig) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("World created with questionable configuration: {}", err);
        }
        let pool = if config.parallel_updates {
            build_pool(config.resolved_worker_threads())
        } else {
            None
        };
        log::info!(
            "Created world (parallel updates: {}, worker threads: {})",
            pool.is_some(),
            pool.as_ref().map_or(0, rayon::ThreadPool::current_num_threads)
        );

        Self {
            entities: SlotMap::with_capacity_and_key(config.initial_entity_capacity),
            dying: Vec::new(),
            spatial: RwLock::new(SpatialHierarchy::new()),
            systems: SlotMap::with_key(),
            schedule: WorldSystemUpdate::new(),
            depths: SecondaryMap::new(),
            wave_count: 0,
            waves_dirty: true,
            waves_generation: 0,
            pool,
            frame: 0,
            config,
        }
    }

    /// Configuration the world was created with
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Frames completed so far
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    // ---- entities ----

    /// Create an unloaded entity
    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        self.insert_entity(Entity::new(name))
    }

    /// Take ownership of a prepared entity
    pub fn insert_entity(&mut self, entity: Entity) -> EntityId {
        log::debug!("Inserted entity '{}'", entity.name());
        let id = self.entities.insert(entity);
        self.waves_dirty = true;
        self.sync_world_bindings(id);
        id
    }

    /// Entity by id
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable entity by id
    ///
    /// Component changes made directly on the entity reach world systems at
    /// the start of the next stage.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// All entities, dying ones included
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Number of entities, dying ones included
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Whether the entity was killed and sits in the dying list
    pub fn is_dying(&self, id: EntityId) -> bool {
        self.dying.contains(&id)
    }

    /// Load an entity's components
    pub fn load_entity(&mut self, id: EntityId) -> EcsResult<()> {
        self.entities.get_mut(id).ok_or(EcsError::UnknownEntity)?.load()
    }

    /// Activate an entity, establishing its pending spatial attachment
    pub fn activate_entity(&mut self, id: EntityId) -> EcsResult<()> {
        let entity = self.entities.get_mut(id).ok_or(EcsError::UnknownEntity)?;
        if entity.state() != EntityState::Loaded {
            return entity.activate();
        }
        if let Some(parent) = entity.spatial_parent() {
            self.attach(parent, id)?;
        }
        if let Some(entity) = self.entities.get_mut(id) {
            entity.set_spatial_parent(None);
            entity.activate()?;
        }
        self.sync_world_bindings(id);
        Ok(())
    }

    /// Deactivate an entity, unbinding local and world systems
    pub fn deactivate_entity(&mut self, id: EntityId) -> EcsResult<()> {
        self.entities.get_mut(id).ok_or(EcsError::UnknownEntity)?.deactive()?;
        self.sync_world_bindings(id);
        Ok(())
    }

    /// Unload a deactivated entity's components
    pub fn unload_entity(&mut self, id: EntityId) -> EcsResult<()> {
        self.entities.get_mut(id).ok_or(EcsError::UnknownEntity)?.unload()
    }

    /// Start the removal countdown of an entity
    pub fn kill_entity(&mut self, id: EntityId) -> EcsResult<()> {
        self.entities.get_mut(id).ok_or(EcsError::UnknownEntity)?.kill();
        Ok(())
    }

    // ---- components ----

    /// Add a component to an entity
    pub fn add_component(
        &mut self,
        entity: EntityId,
        component_type: &ComponentType,
        name: impl Into<String>,
        component: Box<dyn Component>,
    ) -> EcsResult<ComponentId> {
        let id = self
            .entities
            .get_mut(entity)
            .ok_or(EcsError::UnknownEntity)?
            .add_component(component_type, name, component)?;
        self.sync_world_bindings(entity);
        Ok(id)
    }

    /// Add a component of a registered kind
    ///
    /// Spatial components created this way start at identity with empty bounds.
    pub fn create_component(
        &mut self,
        registries: &Registries,
        entity: EntityId,
        kind: &str,
        name: impl Into<String>,
    ) -> EcsResult<ComponentId> {
        let component_type = registries
            .components
            .from_name(kind)
            .ok_or_else(|| EcsError::UnknownType(HashedName::new(kind)))?;
        if component_type.kind() == SPATIAL_COMPONENT {
            return self.add_spatial_component(entity, name, Mat4::identity(), Obb::default(), None);
        }
        self.add_component(entity, &component_type, name, component_type.create())
    }

    /// Add a spatial component backed by a new hierarchy node
    ///
    /// `parent` names another spatial component of the same entity. The first
    /// spatial component of an entity becomes its root.
    pub fn add_spatial_component(
        &mut self,
        entity: EntityId,
        name: impl Into<String>,
        local_transform: Mat4,
        local_bounds: Obb,
        parent: Option<ComponentId>,
    ) -> EcsResult<ComponentId> {
        let owner = self.entities.get(entity).ok_or(EcsError::UnknownEntity)?;
        let parent_handle = parent
            .map(|id| owner.spatial_handle(id).ok_or(EcsError::UnknownComponent))
            .transpose()?;

        let spatial = self.spatial.get_mut();
        let handle = spatial.insert(entity, local_transform, local_bounds);
        if let Some(parent_handle) = parent_handle {
            if let Err(err) = spatial.add_child(parent_handle, handle) {
                if spatial.remove(handle).is_err() {
                    log::debug!("Spatial node of rejected component was already removed");
                }
                return Err(err);
            }
        }

        let inserted = match self.entities.get_mut(entity) {
            Some(owner) => owner.insert_spatial(name.into(), SpatialComponent::new(handle)),
            None => Err(EcsError::UnknownEntity),
        };
        match inserted {
            Ok(id) => {
                self.sync_world_bindings(entity);
                Ok(id)
            }
            Err(err) => {
                if self.spatial.get_mut().remove(handle).is_err() {
                    log::debug!("Spatial node of rejected component was already removed");
                }
                Err(err)
            }
        }
    }

    /// Start the removal countdown of a component
    pub fn kill_component(&mut self, entity: EntityId, id: ComponentId) -> EcsResult<()> {
        self.entities
            .get_mut(entity)
            .ok_or(EcsError::UnknownEntity)?
            .kill_component(id)
    }

    /// Shut a component down without unloading it, unbinding it from systems
    pub fn shutdown_component(&mut self, entity: EntityId, id: ComponentId) -> EcsResult<()> {
        self.entities
            .get_mut(entity)
            .ok_or(EcsError::UnknownEntity)?
            .shutdown_component(id)?;
        self.sync_world_bindings(entity);
        Ok(())
    }

    /// Initialize a loaded component again, binding it to systems
    pub fn initialize_component(&mut self, entity: EntityId, id: ComponentId) -> EcsResult<()> {
        self.entities
            .get_mut(entity)
            .ok_or(EcsError::UnknownEntity)?
            .initialize_component(id)?;
        self.sync_world_bindings(entity);
        Ok(())
    }

    /// Component of an entity, as a concrete kind
    pub fn component<T: Component>(&self, entity: EntityId, id: ComponentId) -> Option<&T> {
        self.entities.get(entity)?.component::<T>(id)
    }

    /// Mutable component of an entity, as a concrete kind
    pub fn component_mut<T: Component>(&mut self, entity: EntityId, id: ComponentId) -> Option<&mut T> {
        self.entities.get_mut(entity)?.component_mut::<T>(id)
    }

    // ---- spatial ----

    /// Shared access to the spatial hierarchy
    pub fn spatial(&self) -> RwLockReadGuard<'_, SpatialHierarchy> {
        self.spatial.read()
    }

    /// Exclusive access to the spatial hierarchy, for moving and resizing nodes
    pub fn spatial_mut(&mut self) -> &mut SpatialHierarchy {
        self.spatial.get_mut()
    }

    /// Set the local transform of a spatial component
    pub fn set_local_transform(&mut self, entity: EntityId, id: ComponentId, transform: Mat4) -> EcsResult<()> {
        let handle = self
            .entities
            .get(entity)
            .ok_or(EcsError::UnknownEntity)?
            .spatial_handle(id)
            .ok_or(EcsError::UnknownComponent)?;
        self.spatial.get_mut().set_local_transform(handle, transform)
    }

    /// Global transform of a spatial component
    pub fn global_transform(&self, entity: EntityId, id: ComponentId) -> Option<Mat4> {
        let handle = self.entities.get(entity)?.spatial_handle(id)?;
        self.spatial.read().global_transform(handle)
    }

    /// Attach `child`'s root spatial component under `parent`'s root
    ///
    /// Both entities must be spatial. The child is updated strictly after
    /// the parent from the next stage on.
    pub fn attach(&mut self, parent: EntityId, child: EntityId) -> EcsResult<()> {
        let parent_root = self.root_handle_of(parent)?;
        let child_root = self.root_handle_of(child)?;
        self.spatial.get_mut().add_child(parent_root, child_root)?;
        self.waves_dirty = true;
        log::debug!("Attached entity {:?} to {:?}", child, parent);
        Ok(())
    }

    /// Detach `child`'s root spatial component from its parent
    pub fn detach(&mut self, child: EntityId) -> EcsResult<()> {
        let child_root = self.root_handle_of(child)?;
        self.spatial.get_mut().detach(child_root)?;
        self.waves_dirty = true;
        Ok(())
    }

    /// Parent entity `child` is attached to
    pub fn attachment_parent(&self, child: EntityId) -> Option<EntityId> {
        let root = self.entities.get(child)?.root_handle()?;
        self.spatial.read().parent_entity(root)
    }

    fn root_handle_of(&self, id: EntityId) -> EcsResult<SpatialHandle> {
        let entity = self.entities.get(id).ok_or(EcsError::UnknownEntity)?;
        entity.root_handle().ok_or_else(|| {
            log::warn!("Entity '{}' is not a spatial entity", entity.name());
            EcsError::NotSpatialEntity
        })
    }

    // ---- world systems ----

    /// Add a world system, at most one per system name
    pub fn add_world_system(&mut self, mut system: Box<dyn WorldSystem>) -> EcsResult<WorldSystemKey> {
        let name = system.name();
        if self.find_world_system(name).is_some() {
            log::warn!("World already has system '{}'", name);
            return Err(EcsError::DuplicateSystem(name));
        }

        let mut stages = StageRequests::new();
        system.register_updates(&mut stages);
        let requests = system.component_requests();
        system.system_was_added_to_world();

        let key = self.systems.insert(GlobalSystem {
            system,
            requests,
            bindings: SecondaryMap::new(),
        });
        self.schedule.add_requests(key, &stages);

        if let Some(global) = self.systems.get_mut(key) {
            for (id, entity) in &self.entities {
                global.sync_entity(id, &entity.world_candidates());
            }
        }
        log::debug!("Added world system '{}'", name);
        Ok(key)
    }

    /// Add a world system of a registered kind
    pub fn add_world_system_by_name(&mut self, registries: &Registries, name: &str) -> EcsResult<WorldSystemKey> {
        let system_type = registries
            .world_systems
            .from_name(name)
            .ok_or_else(|| EcsError::UnknownType(HashedName::new(name)))?;
        self.add_world_system(system_type.create())
    }

    /// Remove a world system, unbinding everything it was bound to first
    pub fn remove_world_system(&mut self, key: WorldSystemKey) -> EcsResult<Box<dyn WorldSystem>> {
        let mut global = self.systems.remove(key).ok_or(EcsError::UnknownSystem)?;
        let bound: Vec<EntityId> = global.bindings.keys().collect();
        for entity in bound {
            global.unbind_entity(entity);
        }
        self.schedule.remove_all(key);
        global.system.system_was_removed_from_world();
        log::debug!("Removed world system '{}'", global.system.name());
        Ok(global.system)
    }

    /// Key of the world system with the given name
    pub fn find_world_system(&self, name: &str) -> Option<WorldSystemKey> {
        self.systems
            .iter()
            .find(|(_, global)| global.system.name() == name)
            .map(|(key, _)| key)
    }

    /// World system as a concrete kind
    pub fn world_system<T: WorldSystem>(&self, key: WorldSystemKey) -> Option<&T> {
        self.systems.get(key)?.system.downcast_ref::<T>()
    }

    /// Mutable world system as a concrete kind
    pub fn world_system_mut<T: WorldSystem>(&mut self, key: WorldSystemKey) -> Option<&mut T> {
        self.systems.get_mut(key)?.system.downcast_mut::<T>()
    }

    /// World scheduler
    pub fn schedule(&self) -> &WorldSystemUpdate {
        &self.schedule
    }

    // ---- frame ----

    /// Run one stage: entities wave by wave, then world systems
    ///
    /// `EndFrame` finishes by sweeping killed entities.
    pub fn update(&mut self, stage: UpdateStage) {
        self.sync_dirty_entities();
        if self.waves_dirty || self.spatial.get_mut().structure_generation() != self.waves_generation {
            self.rebuild_waves();
        }
        self.update_entities(stage);
        self.sync_dirty_entities();
        self.update_world_systems(stage);

        if stage == UpdateStage::EndFrame {
            self.sweep_entities();
            self.frame += 1;
        }
    }

    /// Run every stage in order
    pub fn run_frame(&mut self) {
        for stage in UpdateStage::ALL {
            self.update(stage);
        }
    }

    /// Update wave of an entity, as of the last rebuild
    pub fn update_wave(&self, id: EntityId) -> Option<usize> {
        self.depths.get(id).copied()
    }

    fn update_entities(&mut self, stage: UpdateStage) {
        let Self {
            entities,
            depths,
            spatial,
            pool,
            wave_count,
            ..
        } = self;
        let spatial = &*spatial;

        for depth in 0..*wave_count {
            let wave: Vec<&mut Entity> = entities
                .iter_mut()
                .filter(|(id, _)| depths.get(*id).copied().unwrap_or(0) == depth)
                .map(|(_, entity)| entity)
                .collect();
            if wave.is_empty() {
                continue;
            }
            match pool {
                Some(pool) => pool.install(|| {
                    wave.into_par_iter()
                        .for_each(|entity| entity.update(stage, spatial));
                }),
                None => {
                    for entity in wave {
                        entity.update(stage, spatial);
                    }
                }
            }
        }
    }

    fn update_world_systems(&mut self, stage: UpdateStage) {
        let Self {
            entities,
            spatial,
            systems,
            schedule,
            ..
        } = self;
        let spatial = spatial.get_mut();

        for key in schedule.iter(stage) {
            if let Some(global) = systems.get_mut(key) {
                log::trace!("world [{}] {}", stage, global.system.name());
                let mut context = WorldContext {
                    entities: &mut *entities,
                    spatial: &mut *spatial,
                };
                global.system.update(stage, &mut context);
            }
        }
    }

    /// Resync world bindings of entities whose components changed
    fn sync_dirty_entities(&mut self) {
        let mut dirty = Vec::new();
        for (id, entity) in &mut self.entities {
            if entity.take_membership_dirty() {
                dirty.push(id);
            }
            if entity.take_hierarchy_changed() {
                self.waves_dirty = true;
            }
        }
        for id in dirty {
            self.sync_world_bindings(id);
        }
    }

    fn sync_world_bindings(&mut self, id: EntityId) {
        let candidates = self
            .entities
            .get(id)
            .map(Entity::world_candidates)
            .unwrap_or_default();
        for global in self.systems.values_mut() {
            global.sync_entity(id, &candidates);
        }
    }

    fn rebuild_waves(&mut self) {
        let spatial = self.spatial.get_mut();
        self.depths.clear();
        let mut wave_count = 0;
        for id in self.entities.keys() {
            let depth = attachment_depth(&self.entities, spatial, id);
            self.depths.insert(id, depth);
            wave_count = wave_count.max(depth + 1);
        }
        self.wave_count = wave_count;
        self.waves_dirty = false;
        self.waves_generation = spatial.structure_generation();
        log::debug!(
            "Rebuilt {} update waves for {} entities",
            wave_count,
            self.entities.len()
        );
    }

    fn sweep_entities(&mut self) {
        for (id, entity) in &self.entities {
            if entity.is_pending_removal() && !self.dying.contains(&id) {
                self.dying.push(id);
            }
        }

        let entities = &self.entities;
        let (expired, remaining): (Vec<EntityId>, Vec<EntityId>) = self
            .dying
            .iter()
            .copied()
            .partition(|id| entities.get(*id).map_or(true, |e| e.alive().delete_owner()));
        self.dying = remaining;

        for id in expired {
            self.evict_entity(id);
        }
    }

    fn evict_entity(&mut self, id: EntityId) {
        for global in self.systems.values_mut() {
            global.unbind_entity(id);
        }
        let Some(mut entity) = self.entities.remove(id) else {
            return;
        };
        entity.teardown(self.spatial.get_mut());
        self.depths.remove(id);
        self.waves_dirty = true;
        log::debug!("Evicted entity '{}'", entity.name());
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("dying", &self.dying.len())
            .field("world_systems", &self.systems.len())
            .field("waves", &self.wave_count)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

/// Number of parent entities above `id`
fn attachment_depth(entities: &SlotMap<EntityId, Entity>, spatial: &SpatialHierarchy, id: EntityId) -> usize {
    let mut depth = 0;
    let mut current = id;
    while let Some(parent) = entities
        .get(current)
        .and_then(Entity::root_handle)
        .and_then(|root| spatial.parent_entity(root))
    {
        depth += 1;
        current = parent;
        if depth > entities.len() {
            break;
        }
    }
    depth
}

fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("entity-worker-{index}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            log::warn!("Falling back to sequential entity updates: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Mesh;
    impl Component for Mesh {}

    #[test]
    fn test_sequential_world_has_no_pool() {
        let world = World::new(WorldConfig::sequential());
        assert!(world.pool.is_none());
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_parallel_world_uses_configured_threads() {
        let world = World::new(WorldConfig::new().with_worker_threads(2));
        assert_eq!(world.pool.as_ref().map(rayon::ThreadPool::current_num_threads), Some(2));
    }

    #[test]
    fn test_unknown_entity() {
        let mut world = World::new(WorldConfig::sequential());
        let id = world.create_entity("gone");
        world.kill_entity(id).expect("kill");
        for _ in 0..11 {
            world.run_frame();
        }
        assert!(world.entity(id).is_none());
        assert_eq!(world.load_entity(id), Err(EcsError::UnknownEntity));
        assert_eq!(world.kill_entity(id), Err(EcsError::UnknownEntity));
    }

    #[test]
    fn test_create_component_by_name() {
        let mut registries = Registries::new();
        registries.components.add(ComponentType::of::<Mesh>("mesh", true));
        let mut world = World::new(WorldConfig::sequential());
        let id = world.create_entity("crate");

        let mesh = world.create_component(&registries, id, "mesh", "body").expect("mesh");
        assert!(world.component::<Mesh>(id, mesh).is_some());

        let root = world.create_component(&registries, id, "spatial", "root").expect("spatial");
        assert_eq!(world.entity(id).and_then(Entity::root_component), Some(root));
        assert_eq!(world.spatial().len(), 1);

        assert_eq!(
            world.create_component(&registries, id, "missing", "x"),
            Err(EcsError::UnknownType(HashedName::new("missing")))
        );
    }
}

//! Name-to-factory registries
//!
//! Component kinds, entity-system kinds and world-system kinds are declared
//! once at startup by writing a descriptor into the matching registry. The
//! registries travel in a [`Registries`] context that the host hands to the
//! calls constructing things by name; there is no global instance.
//!
//! ```
//! use entity_core::ecs::{Component, ComponentType, Registries};
//!
//! #[derive(Default)]
//! struct Mesh;
//! impl Component for Mesh {}
//!
//! let mut registries = Registries::new();
//! registries.components.add(ComponentType::of::<Mesh>("mesh", true));
//!
//! assert!(registries.components.from_name("mesh").is_some());
//! assert!(registries.components.from_name("missing").is_none());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::component::Component;
use super::system::{EntitySystem, WorldSystem};
use crate::foundation::HashedName;

/// Something a [`Registry`] can store
pub trait Descriptor: Send + Sync {
    /// Declared name
    fn name(&self) -> &'static str;

    /// Hash of the declared name
    fn hashed_name(&self) -> HashedName {
        HashedName::new(self.name())
    }
}

/// Hashed-name to descriptor map
pub struct Registry<D: Descriptor> {
    entries: HashMap<HashedName, Arc<D>>,
}

impl<D: Descriptor> Registry<D> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a descriptor; a previous entry with the same name is replaced
    pub fn add(&mut self, descriptor: D) -> Arc<D> {
        let descriptor = Arc::new(descriptor);
        let key = descriptor.hashed_name();
        if let Some(previous) = self.entries.insert(key, Arc::clone(&descriptor)) {
            log::debug!(
                "Registry entry '{}' replaced by '{}'",
                previous.name(),
                descriptor.name()
            );
        } else {
            log::debug!("Registered '{}' ({})", descriptor.name(), key);
        }
        descriptor
    }

    /// Look up by name; unknown names give `None`
    pub fn from_name(&self, name: &str) -> Option<Arc<D>> {
        self.get(HashedName::new(name))
    }

    /// Look up by hash
    pub fn get(&self, name: HashedName) -> Option<Arc<D>> {
        self.entries.get(&name).cloned()
    }

    /// Check whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&HashedName::new(name))
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all descriptors, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<D>> {
        self.entries.values()
    }
}

impl<D: Descriptor> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Descriptor> fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.values().map(|d| d.name()))
            .finish()
    }
}

/// Immutable descriptor of a component kind
#[derive(Clone)]
pub struct ComponentType {
    name: &'static str,
    hash: HashedName,
    max_one_per_entity: bool,
    create: fn() -> Box<dyn Component>,
}

impl ComponentType {
    /// Descriptor with an explicit factory
    pub const fn new(
        name: &'static str,
        max_one_per_entity: bool,
        create: fn() -> Box<dyn Component>,
    ) -> Self {
        Self {
            name,
            hash: HashedName::new(name),
            max_one_per_entity,
            create,
        }
    }

    /// Descriptor whose factory default-constructs `T`
    pub fn of<T: Component + Default>(name: &'static str, max_one_per_entity: bool) -> Self {
        Self::new(name, max_one_per_entity, create_default::<T>)
    }

    /// Hash of the declared name, the component kind
    pub const fn kind(&self) -> HashedName {
        self.hash
    }

    /// Whether an entity may hold at most one component of this kind
    pub const fn max_one_per_entity(&self) -> bool {
        self.max_one_per_entity
    }

    /// Construct a fresh component
    pub fn create(&self) -> Box<dyn Component> {
        (self.create)()
    }
}

impl Descriptor for ComponentType {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hashed_name(&self) -> HashedName {
        self.hash
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.name)
            .field("max_one_per_entity", &self.max_one_per_entity)
            .finish_non_exhaustive()
    }
}

fn create_default<T: Component + Default>() -> Box<dyn Component> {
    Box::new(T::default())
}

/// Descriptor of an entity-local system kind
#[derive(Clone)]
pub struct EntitySystemType {
    name: &'static str,
    create: fn() -> Box<dyn EntitySystem>,
}

impl EntitySystemType {
    /// Descriptor with an explicit factory
    pub const fn new(name: &'static str, create: fn() -> Box<dyn EntitySystem>) -> Self {
        Self { name, create }
    }

    /// Construct a fresh system
    pub fn create(&self) -> Box<dyn EntitySystem> {
        (self.create)()
    }
}

impl Descriptor for EntitySystemType {
    fn name(&self) -> &'static str {
        self.name
    }
}

/// Descriptor of a world-global system kind
#[derive(Clone)]
pub struct WorldSystemType {
    name: &'static str,
    create: fn() -> Box<dyn WorldSystem>,
}

impl WorldSystemType {
    /// Descriptor with an explicit factory
    pub const fn new(name: &'static str, create: fn() -> Box<dyn WorldSystem>) -> Self {
        Self { name, create }
    }

    /// Construct a fresh system
    pub fn create(&self) -> Box<dyn WorldSystem> {
        (self.create)()
    }
}

impl Descriptor for WorldSystemType {
    fn name(&self) -> &'static str {
        self.name
    }
}

/// Registry of component kinds
pub type ComponentTypeRegistry = Registry<ComponentType>;

/// Registry of entity-local system kinds
pub type EntitySystemRegistry = Registry<EntitySystemType>;

/// Registry of world-global system kinds
pub type WorldSystemRegistry = Registry<WorldSystemType>;

/// Startup context bundling every registry
///
/// Populate it before the first frame, then share it read-only.
#[derive(Debug, Default)]
pub struct Registries {
    /// Component kinds
    pub components: ComponentTypeRegistry,
    /// Entity-local system kinds
    pub entity_systems: EntitySystemRegistry,
    /// World-global system kinds
    pub world_systems: WorldSystemRegistry,
}

impl Registries {
    /// Create empty registries with the built-in spatial component kind registered
    pub fn new() -> Self {
        let mut registries = Self::default();
        registries.components.add(super::spatial::SpatialComponent::component_type());
        registries
    }

    /// Run a module's registration function
    pub fn register_module(&mut self, register: impl FnOnce(&mut Self)) -> &mut Self {
        register(self);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Mesh {
        lod: u32,
    }
    impl Component for Mesh {}

    #[derive(Default)]
    struct Cloth;
    impl Component for Cloth {}

    #[test]
    fn test_lookup_by_name() {
        let mut registry = ComponentTypeRegistry::new();
        registry.add(ComponentType::of::<Mesh>("mesh", true));

        let found = registry.from_name("mesh").expect("mesh registered");
        assert_eq!(found.name(), "mesh");
        assert!(found.max_one_per_entity());
        assert!(registry.from_name("missing").is_none());
    }

    #[test]
    fn test_factory_creates_default_instance() {
        let mesh_type = ComponentType::of::<Mesh>("mesh", true);
        let component = mesh_type.create();
        assert_eq!(component.downcast_ref::<Mesh>().map(|m| m.lod), Some(0));
        assert!(component.downcast_ref::<Cloth>().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut registry = ComponentTypeRegistry::new();
        registry.add(ComponentType::of::<Mesh>("mesh", true));
        registry.add(ComponentType::of::<Cloth>("mesh", false));

        assert_eq!(registry.len(), 1);
        let found = registry.get(HashedName::new("mesh")).expect("mesh registered");
        assert!(!found.max_one_per_entity());
        assert!(found.create().downcast_ref::<Cloth>().is_some());
    }

    #[test]
    fn test_registries_context() {
        fn register_render_module(registries: &mut Registries) {
            registries.components.add(ComponentType::of::<Mesh>("mesh", true));
            registries.components.add(ComponentType::of::<Cloth>("cloth", false));
        }

        let mut registries = Registries::new();
        registries.register_module(register_render_module);

        assert!(registries.components.contains("spatial"));
        assert!(registries.components.contains("mesh"));
        assert!(registries.components.contains("cloth"));
        assert!(registries.entity_systems.is_empty());
        assert!(registries.world_systems.is_empty());
    }
}

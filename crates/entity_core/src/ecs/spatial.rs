//! Spatial hierarchy
//!
//! Transform nodes of every entity in a world live in one arena owned by the
//! world. Parent and child links are generational handles, so a link to a
//! removed node fails to resolve instead of dangling. Inside its entity a node
//! is represented by a [`SpatialComponent`], the only kind of component that
//! refers to something outside itself.
//!
//! Global transforms are kept current eagerly: changing a local transform
//! recomputes the whole subtree below that node before returning.
//!
//! Only the world changes the shape of the hierarchy. Systems may move nodes
//! and resize their bounds; links between nodes of different entities are
//! made through [`World::attach`](super::World::attach).

use slotmap::SlotMap;

use super::component::Component;
use super::entity::EntityId;
use super::error::{EcsError, EcsResult};
use super::registry::ComponentType;
use crate::foundation::math::{Mat4, Obb};
use crate::foundation::HashedName;

slotmap::new_key_type! {
    /// Generational handle of a node in a [`SpatialHierarchy`]
    pub struct SpatialHandle;
}

/// Registered type name of [`SpatialComponent`]
pub const SPATIAL_COMPONENT_NAME: &str = "spatial";

/// Kind of [`SpatialComponent`]
pub const SPATIAL_COMPONENT: HashedName = HashedName::new(SPATIAL_COMPONENT_NAME);

/// Transform node
#[derive(Debug, Clone)]
pub struct SpatialNode {
    owner: EntityId,
    local_transform: Mat4,
    global_transform: Mat4,
    local_bounds: Obb,
    world_bounds: Obb,
    parent: Option<SpatialHandle>,
    children: Vec<SpatialHandle>,
}

impl SpatialNode {
    /// Entity whose component this node backs
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Transform relative to the parent
    pub fn local_transform(&self) -> &Mat4 {
        &self.local_transform
    }

    /// Transform relative to the world
    pub fn global_transform(&self) -> &Mat4 {
        &self.global_transform
    }

    /// Bounds in node space
    pub fn local_bounds(&self) -> &Obb {
        &self.local_bounds
    }

    /// Bounds in world space
    pub fn world_bounds(&self) -> &Obb {
        &self.world_bounds
    }

    /// Parent node, `None` for roots
    pub fn parent(&self) -> Option<SpatialHandle> {
        self.parent
    }

    /// Child nodes, in no meaningful order
    pub fn children(&self) -> &[SpatialHandle] {
        &self.children
    }
}

/// Arena of every spatial node in a world
#[derive(Debug, Default)]
pub struct SpatialHierarchy {
    nodes: SlotMap<SpatialHandle, SpatialNode>,
    generation: u64,
}

impl SpatialHierarchy {
    /// Create an empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter bumped by every change to parent/child links
    pub fn structure_generation(&self) -> u64 {
        self.generation
    }

    /// Insert a root node
    pub(crate) fn insert(&mut self, owner: EntityId, local_transform: Mat4, local_bounds: Obb) -> SpatialHandle {
        self.nodes.insert(SpatialNode {
            owner,
            local_transform,
            global_transform: local_transform,
            local_bounds,
            world_bounds: local_bounds.transformed(&local_transform),
            parent: None,
            children: Vec::new(),
        })
    }

    /// Remove a node; its children become roots
    pub(crate) fn remove(&mut self, handle: SpatialHandle) -> EcsResult<SpatialNode> {
        self.unlink(handle)?;
        let node = self.nodes.remove(handle).ok_or(EcsError::StaleSpatialHandle)?;
        self.generation += 1;
        for child in &node.children {
            if let Some(child_node) = self.nodes.get_mut(*child) {
                child_node.parent = None;
            }
            self.propagate(*child);
        }
        Ok(node)
    }

    /// Node by handle
    pub fn get(&self, handle: SpatialHandle) -> Option<&SpatialNode> {
        self.nodes.get(handle)
    }

    /// Whether the handle still resolves
    pub fn contains(&self, handle: SpatialHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Set the local transform and recompute the subtree
    pub fn set_local_transform(&mut self, handle: SpatialHandle, transform: Mat4) -> EcsResult<()> {
        let node = self.nodes.get_mut(handle).ok_or(EcsError::StaleSpatialHandle)?;
        node.local_transform = transform;
        self.propagate(handle);
        Ok(())
    }

    /// Set the node-space bounds and recompute world bounds
    pub fn set_local_bounds(&mut self, handle: SpatialHandle, bounds: Obb) -> EcsResult<()> {
        let node = self.nodes.get_mut(handle).ok_or(EcsError::StaleSpatialHandle)?;
        node.local_bounds = bounds;
        node.world_bounds = bounds.transformed(&node.global_transform);
        Ok(())
    }

    /// Local transform of a node
    pub fn local_transform(&self, handle: SpatialHandle) -> Option<Mat4> {
        self.nodes.get(handle).map(|node| node.local_transform)
    }

    /// Global transform of a node
    pub fn global_transform(&self, handle: SpatialHandle) -> Option<Mat4> {
        self.nodes.get(handle).map(|node| node.global_transform)
    }

    /// Node-space bounds
    pub fn local_bounds(&self, handle: SpatialHandle) -> Option<Obb> {
        self.nodes.get(handle).map(|node| node.local_bounds)
    }

    /// World-space bounds
    pub fn world_bounds(&self, handle: SpatialHandle) -> Option<Obb> {
        self.nodes.get(handle).map(|node| node.world_bounds)
    }

    /// Owning entity of a node
    pub fn owner(&self, handle: SpatialHandle) -> Option<EntityId> {
        self.nodes.get(handle).map(|node| node.owner)
    }

    /// Parent of a node
    pub fn parent(&self, handle: SpatialHandle) -> Option<SpatialHandle> {
        self.nodes.get(handle)?.parent
    }

    /// Owner of the nearest ancestor that belongs to another entity
    pub fn parent_entity(&self, handle: SpatialHandle) -> Option<EntityId> {
        let owner = self.owner(handle)?;
        let mut current = self.parent(handle);
        while let Some(ancestor) = current {
            let ancestor_owner = self.owner(ancestor)?;
            if ancestor_owner != owner {
                return Some(ancestor_owner);
            }
            current = self.parent(ancestor);
        }
        None
    }

    /// Children of a node; empty for stale handles
    pub fn children(&self, handle: SpatialHandle) -> &[SpatialHandle] {
        self.nodes
            .get(handle)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Number of ancestors
    pub fn depth(&self, handle: SpatialHandle) -> Option<usize> {
        let mut current = self.nodes.get(handle)?;
        let mut depth = 0;
        while let Some(parent) = current.parent.and_then(|p| self.nodes.get(p)) {
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    /// Whether `ancestor` is `handle` or lies above it
    pub fn is_ancestor(&self, ancestor: SpatialHandle, handle: SpatialHandle) -> bool {
        let mut current = Some(handle);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Make `child` a child of `parent`, detaching it from any previous parent
    pub(crate) fn add_child(&mut self, parent: SpatialHandle, child: SpatialHandle) -> EcsResult<()> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(EcsError::StaleSpatialHandle);
        }
        if self.is_ancestor(child, parent) {
            log::warn!("Rejected attachment that would create a spatial cycle");
            return Err(EcsError::AttachmentCycle);
        }
        self.unlink(child)?;
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
        }
        self.generation += 1;
        self.propagate(child);
        Ok(())
    }

    /// Make a node a root
    pub(crate) fn detach(&mut self, child: SpatialHandle) -> EcsResult<()> {
        self.unlink(child)?;
        self.generation += 1;
        self.propagate(child);
        Ok(())
    }

    /// Nodes owned by an entity
    pub fn nodes_of(&self, owner: EntityId) -> Vec<SpatialHandle> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.owner == owner)
            .map(|(handle, _)| handle)
            .collect()
    }

    fn unlink(&mut self, child: SpatialHandle) -> EcsResult<()> {
        let node = self.nodes.get_mut(child).ok_or(EcsError::StaleSpatialHandle)?;
        if let Some(parent) = node.parent.take() {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|c| *c != child);
            }
        }
        Ok(())
    }

    /// Recompute global transforms and world bounds from `root` down
    fn propagate(&mut self, root: SpatialHandle) {
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let parent_global = self
                .parent(handle)
                .and_then(|p| self.nodes.get(p))
                .map(|p| p.global_transform);
            let Some(node) = self.nodes.get_mut(handle) else {
                continue;
            };
            node.global_transform = match parent_global {
                Some(parent_global) => parent_global * node.local_transform,
                None => node.local_transform,
            };
            node.world_bounds = node.local_bounds.transformed(&node.global_transform);
            stack.extend(node.children.iter().copied());
        }
    }
}

/// Entity-side proxy of a node in the world's [`SpatialHierarchy`]
///
/// Created by [`World::add_spatial_component`](super::World::add_spatial_component).
/// The first one added to an entity becomes its root and makes the entity a
/// spatial entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialComponent {
    handle: SpatialHandle,
}

impl SpatialComponent {
    pub(crate) fn new(handle: SpatialHandle) -> Self {
        Self { handle }
    }

    /// Node in the world's hierarchy
    pub fn handle(&self) -> SpatialHandle {
        self.handle
    }

    /// Descriptor registered by [`Registries::new`](super::Registries::new)
    pub fn component_type() -> ComponentType {
        ComponentType::of::<Self>(SPATIAL_COMPONENT_NAME, false)
    }
}

impl Component for SpatialComponent {}

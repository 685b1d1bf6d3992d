//! Component storage of one entity
//!
//! Slots live in a generational arena so handles held by systems go stale
//! instead of dangling. Insertion order is tracked separately because
//! membership callbacks are reported in that order. Killed slots move to a
//! dying list and stay resolvable until their grace window runs out.

use slotmap::SlotMap;

use super::component::{Component, ComponentHandle, ComponentId, ComponentSlot, ComponentState};
use super::error::{EcsError, EcsResult};
use super::registry::{ComponentType, Descriptor};
use crate::foundation::HashedName;

/// Live and dying components of an entity
#[derive(Debug, Default)]
pub struct ComponentSet {
    slots: SlotMap<ComponentId, ComponentSlot>,
    order: Vec<ComponentId>,
    dying: Vec<ComponentId>,
}

impl ComponentSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        component_type: &ComponentType,
        name: String,
        component: Box<dyn Component>,
    ) -> ComponentId {
        let id = self.slots.insert_with_key(|id| {
            ComponentSlot::new(id, component_type.kind(), component_type.name(), name, component)
        });
        self.order.push(id);
        id
    }

    /// Slot by id, dying slots included
    pub fn get(&self, id: ComponentId) -> Option<&ComponentSlot> {
        self.slots.get(id)
    }

    /// Mutable slot by id, dying slots included
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentSlot> {
        self.slots.get_mut(id)
    }

    /// Component by id, as a concrete kind
    pub fn component<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.slots.get(id)?.get::<T>()
    }

    /// Mutable component by id, as a concrete kind
    pub fn component_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.slots.get_mut(id)?.get_mut::<T>()
    }

    /// Whether the id still resolves
    pub fn contains(&self, id: ComponentId) -> bool {
        self.slots.contains_key(id)
    }

    /// Whether the component sits in the dying list
    pub fn is_dying(&self, id: ComponentId) -> bool {
        self.dying.contains(&id)
    }

    /// Number of slots, dying ones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots at all
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in insertion order, dying ones included
    pub fn iter(&self) -> impl Iterator<Item = &ComponentSlot> {
        self.order.iter().filter_map(|id| self.slots.get(*id))
    }

    /// Slots that are not dying, in insertion order
    pub fn live(&self) -> impl Iterator<Item = &ComponentSlot> {
        self.iter().filter(|slot| !self.dying.contains(&slot.id()))
    }

    /// Ids in insertion order, dying ones included
    pub fn ids(&self) -> &[ComponentId] {
        &self.order
    }

    /// Number of live (not dying) components of a kind
    pub fn live_count_of(&self, kind: HashedName) -> usize {
        self.live().filter(|slot| slot.kind() == kind).count()
    }

    /// Handles of initialized components in insertion order, the set systems bind to
    pub fn candidates(&self) -> Vec<ComponentHandle> {
        self.iter()
            .filter(|slot| slot.state() == ComponentState::Initialized)
            .map(ComponentSlot::handle)
            .collect()
    }

    /// Start the removal countdown of a component
    pub fn kill(&mut self, id: ComponentId) -> EcsResult<()> {
        let slot = self.slots.get_mut(id).ok_or(EcsError::UnknownComponent)?;
        slot.alive_mut().kill();
        Ok(())
    }

    /// One end-frame tick of deferred destruction
    ///
    /// Advances every counter, moves newly killed slots to the dying list and
    /// takes out the slots whose grace window is over. Returned slots are still
    /// in their last load state; the caller shuts them down.
    pub(crate) fn tick_alive_and_sweep(&mut self) -> Vec<ComponentSlot> {
        for slot in self.slots.values_mut() {
            slot.alive_mut().update_for_frame();
        }

        for id in &self.order {
            let pending = self
                .slots
                .get(*id)
                .is_some_and(|slot| slot.alive().is_pending_removal());
            if pending && !self.dying.contains(id) {
                self.dying.push(*id);
            }
        }

        let mut evicted = Vec::new();
        let mut remaining = Vec::with_capacity(self.dying.len());
        for id in self.dying.drain(..) {
            let expired = self.slots.get(id).map_or(true, |slot| slot.alive().delete_owner());
            if expired {
                if let Some(slot) = self.slots.remove(id) {
                    evicted.push(slot);
                }
            } else {
                remaining.push(id);
            }
        }
        self.dying = remaining;

        if !evicted.is_empty() {
            let slots = &self.slots;
            self.order.retain(|id| slots.contains_key(*id));
        }
        evicted
    }

    /// Take out every slot at once, in insertion order
    pub(crate) fn drain(&mut self) -> Vec<ComponentSlot> {
        self.dying.clear();
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|id| self.slots.remove(id))
            .collect()
    }
}

//! Component trait and load state machine
//!
//! Components are data with optional black-box logic (an animation graph
//! component may contain the whole graph evaluation). They never see other
//! components or their entity; systems connect them.
//!
//! Load state switching:
//!
//! ```text
//! Unloaded --load()--> Loading --(done)--> Loaded --initialize()--> Initialized
//!                         |                  ^  <------shutdown()------'
//!                         '--(failed)--> LoadFailed
//! any state --unload()--> Unloaded
//! ```

use std::any::Any;

use super::alive::Alive;
use super::error::{EcsError, EcsResult};
use crate::foundation::HashedName;

slotmap::new_key_type! {
    /// Generational id of a component inside its entity
    pub struct ComponentId;
}

/// Result of starting or polling a resource load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// All resources are available
    Loaded,
    /// Resources still in flight, poll again next frame
    Pending,
    /// Some or all resources could not be loaded
    Failed,
}

/// Load state of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    /// Initial state
    Unloaded,
    /// Resource load is in progress
    Loading,
    /// All resources loaded successfully
    Loaded,
    /// Some or all resources failed to load; stays here until unloaded
    LoadFailed,
    /// Component has been initialized
    Initialized,
}

/// Lifecycle transition names, used in error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// `Unloaded -> Loading`
    Load,
    /// `Loading -> Loaded | LoadFailed`
    CompleteLoad,
    /// `Loaded -> Initialized`
    Initialize,
    /// `Initialized -> Loaded`
    Shutdown,
}

/// Object-safe access to `Any` for trait objects
pub trait AsAny {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Data/behavior unit owned by exactly one entity
///
/// All hooks have empty defaults; a plain data component implements nothing.
pub trait Component: AsAny + Send + Sync + 'static {
    /// Start loading resources
    fn on_load(&mut self) -> LoadStatus {
        LoadStatus::Loaded
    }

    /// Check on a load that reported [`LoadStatus::Pending`]
    fn poll_load(&mut self) -> LoadStatus {
        LoadStatus::Loaded
    }

    /// Release resources
    fn on_unload(&mut self) {}

    /// Called once resources are loaded
    fn on_initialize(&mut self) {}

    /// Counterpart of [`Component::on_initialize`]
    fn on_shutdown(&mut self) {}
}

impl dyn Component {
    /// Downcast to a concrete component kind
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete component kind
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// What systems are told about a component when it is bound or unbound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    /// Id inside the owning entity
    pub id: ComponentId,
    /// Component kind
    pub kind: HashedName,
}

/// A component plus the bookkeeping the owning entity keeps for it
pub struct ComponentSlot {
    id: ComponentId,
    kind: HashedName,
    type_name: &'static str,
    name: String,
    state: ComponentState,
    alive: Alive,
    component: Box<dyn Component>,
}

impl ComponentSlot {
    pub(crate) fn new(
        id: ComponentId,
        kind: HashedName,
        type_name: &'static str,
        name: String,
        component: Box<dyn Component>,
    ) -> Self {
        Self {
            id,
            kind,
            type_name,
            name,
            state: ComponentState::Unloaded,
            alive: Alive::new(),
            component,
        }
    }

    /// Id inside the owning entity
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Component kind
    pub fn kind(&self) -> HashedName {
        self.kind
    }

    /// Registered type name of the kind
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current load state
    pub fn state(&self) -> ComponentState {
        self.state
    }

    /// Deferred destruction counter
    pub fn alive(&self) -> &Alive {
        &self.alive
    }

    pub(crate) fn alive_mut(&mut self) -> &mut Alive {
        &mut self.alive
    }

    /// Handle given to systems
    pub fn handle(&self) -> ComponentHandle {
        ComponentHandle {
            id: self.id,
            kind: self.kind,
        }
    }

    /// The component as a trait object
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// The component as a mutable trait object
    pub fn component_mut(&mut self) -> &mut dyn Component {
        self.component.as_mut()
    }

    /// Borrow as a concrete kind
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.component.downcast_ref::<T>()
    }

    /// Mutably borrow as a concrete kind
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.component.downcast_mut::<T>()
    }

    /// `Unloaded -> Loading`, then `Loaded` or `LoadFailed` unless the load is pending
    pub fn load(&mut self) -> EcsResult<ComponentState> {
        if self.state != ComponentState::Unloaded {
            return Err(self.reject(Transition::Load));
        }
        self.state = ComponentState::Loading;
        let status = self.component.on_load();
        self.apply_load_status(status);
        Ok(self.state)
    }

    /// Poll a pending load
    pub fn poll_load(&mut self) -> EcsResult<ComponentState> {
        if self.state != ComponentState::Loading {
            return Err(self.reject(Transition::CompleteLoad));
        }
        let status = self.component.poll_load();
        self.apply_load_status(status);
        Ok(self.state)
    }

    /// `Loaded -> Initialized`
    pub fn initialize(&mut self) -> EcsResult<()> {
        if self.state != ComponentState::Loaded {
            return Err(self.reject(Transition::Initialize));
        }
        self.component.on_initialize();
        self.state = ComponentState::Initialized;
        Ok(())
    }

    /// `Initialized -> Loaded`
    pub fn shutdown(&mut self) -> EcsResult<()> {
        if self.state != ComponentState::Initialized {
            return Err(self.reject(Transition::Shutdown));
        }
        self.component.on_shutdown();
        self.state = ComponentState::Loaded;
        Ok(())
    }

    /// Any state -> `Unloaded`, shutting down first if initialized
    pub fn unload(&mut self) {
        match self.state {
            ComponentState::Unloaded => return,
            ComponentState::Initialized => {
                self.component.on_shutdown();
                self.component.on_unload();
            }
            ComponentState::Loading | ComponentState::Loaded | ComponentState::LoadFailed => {
                self.component.on_unload();
            }
        }
        self.state = ComponentState::Unloaded;
    }

    fn apply_load_status(&mut self, status: LoadStatus) {
        match status {
            LoadStatus::Loaded => self.state = ComponentState::Loaded,
            LoadStatus::Failed => {
                log::warn!("Component '{}' ({}) failed to load", self.name, self.type_name);
                self.state = ComponentState::LoadFailed;
            }
            LoadStatus::Pending => {}
        }
    }

    fn reject(&self, requested: Transition) -> EcsError {
        log::warn!(
            "Rejected {:?} on component '{}' in state {:?}",
            requested, self.name, self.state
        );
        EcsError::InvalidTransition {
            from: self.state,
            requested,
        }
    }
}

impl std::fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSlot")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records hook calls and plays back scripted load results
    #[derive(Default)]
    struct Probe {
        load_results: Vec<LoadStatus>,
        calls: Vec<&'static str>,
    }

    impl Component for Probe {
        fn on_load(&mut self) -> LoadStatus {
            self.calls.push("load");
            self.load_results.pop().unwrap_or(LoadStatus::Loaded)
        }
        fn poll_load(&mut self) -> LoadStatus {
            self.calls.push("poll");
            self.load_results.pop().unwrap_or(LoadStatus::Loaded)
        }
        fn on_unload(&mut self) {
            self.calls.push("unload");
        }
        fn on_initialize(&mut self) {
            self.calls.push("initialize");
        }
        fn on_shutdown(&mut self) {
            self.calls.push("shutdown");
        }
    }

    fn slot(load_results: Vec<LoadStatus>) -> ComponentSlot {
        ComponentSlot::new(
            ComponentId::default(),
            HashedName::new("probe"),
            "probe",
            "test probe".to_string(),
            Box::new(Probe { load_results, calls: Vec::new() }),
        )
    }

    fn calls(slot: &ComponentSlot) -> Vec<&'static str> {
        slot.get::<Probe>().expect("probe").calls.clone()
    }

    #[test]
    fn test_full_lifecycle() {
        let mut slot = slot(vec![]);
        assert_eq!(slot.state(), ComponentState::Unloaded);

        assert_eq!(slot.load(), Ok(ComponentState::Loaded));
        slot.initialize().expect("initialize");
        assert_eq!(slot.state(), ComponentState::Initialized);
        slot.shutdown().expect("shutdown");
        assert_eq!(slot.state(), ComponentState::Loaded);
        slot.unload();
        assert_eq!(slot.state(), ComponentState::Unloaded);

        assert_eq!(calls(&slot), vec!["load", "initialize", "shutdown", "unload"]);
    }

    #[test]
    fn test_initialize_from_unloaded_is_rejected() {
        let mut slot = slot(vec![]);
        let err = slot.initialize().unwrap_err();
        assert_eq!(
            err,
            EcsError::InvalidTransition {
                from: ComponentState::Unloaded,
                requested: Transition::Initialize,
            }
        );
        assert_eq!(slot.state(), ComponentState::Unloaded);
        assert!(calls(&slot).is_empty());
    }

    #[test]
    fn test_illegal_transitions_leave_state_unchanged() {
        let mut slot = slot(vec![]);
        assert!(slot.shutdown().is_err());
        assert!(slot.poll_load().is_err());

        slot.load().expect("load");
        assert!(slot.load().is_err());
        assert!(slot.shutdown().is_err());
        assert_eq!(slot.state(), ComponentState::Loaded);

        slot.initialize().expect("initialize");
        assert!(slot.initialize().is_err());
        assert_eq!(slot.state(), ComponentState::Initialized);
    }

    #[test]
    fn test_load_failed_is_terminal_until_unload() {
        let mut slot = slot(vec![LoadStatus::Failed]);
        assert_eq!(slot.load(), Ok(ComponentState::LoadFailed));

        assert!(slot.initialize().is_err());
        assert!(slot.load().is_err());
        assert!(slot.poll_load().is_err());
        assert_eq!(slot.state(), ComponentState::LoadFailed);

        slot.unload();
        assert_eq!(slot.state(), ComponentState::Unloaded);
        // Explicit retry after unload is allowed
        assert_eq!(slot.load(), Ok(ComponentState::Loaded));
    }

    #[test]
    fn test_pending_load_completes_on_poll() {
        // Popped from the back: load -> Pending, first poll -> Pending, second poll -> Loaded
        let mut slot = slot(vec![LoadStatus::Loaded, LoadStatus::Pending, LoadStatus::Pending]);
        assert_eq!(slot.load(), Ok(ComponentState::Loading));
        assert!(slot.initialize().is_err());
        assert_eq!(slot.poll_load(), Ok(ComponentState::Loading));
        assert_eq!(slot.poll_load(), Ok(ComponentState::Loaded));
        assert_eq!(calls(&slot), vec!["load", "poll", "poll"]);
    }

    #[test]
    fn test_unload_from_initialized_shuts_down_first() {
        let mut slot = slot(vec![]);
        slot.load().expect("load");
        slot.initialize().expect("initialize");
        slot.unload();

        assert_eq!(slot.state(), ComponentState::Unloaded);
        assert_eq!(calls(&slot), vec!["load", "initialize", "shutdown", "unload"]);
    }

    #[test]
    fn test_unload_while_loading() {
        let mut slot = slot(vec![LoadStatus::Pending]);
        slot.load().expect("load");
        slot.unload();
        assert_eq!(slot.state(), ComponentState::Unloaded);

        // Unloading an unloaded component is a no-op
        slot.unload();
        assert_eq!(calls(&slot), vec!["load", "unload"]);
    }
}

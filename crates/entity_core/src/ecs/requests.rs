//! Component requests and system membership
//!
//! A system declares the component kinds it needs. Whenever an entity's
//! component set changes, the owner recomputes which components each system
//! should see and reports only the difference through the system's
//! added/removed callbacks. Systems keep the handles they are given, so an
//! update never searches the entity.
//!
//! Example: a character animation system requires `animation` and
//! `skeletal_mesh` and optionally takes `cloth`.

use super::component::ComponentHandle;
use crate::foundation::HashedName;

/// Required and optional component kinds of a system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedComponents {
    /// Kinds that must all be present for the system to attach
    pub required: Vec<HashedName>,
    /// Kinds the system uses when present
    pub optional: Vec<HashedName>,
}

impl RequestedComponents {
    /// Empty request set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: add a required kind
    pub fn require(mut self, kind: impl Into<HashedName>) -> Self {
        self.required.push(kind.into());
        self
    }

    /// Builder pattern: add an optional kind
    pub fn optional(mut self, kind: impl Into<HashedName>) -> Self {
        self.optional.push(kind.into());
        self
    }

    /// Whether the kind is required or optional
    pub fn wants(&self, kind: HashedName) -> bool {
        self.required.contains(&kind) || self.optional.contains(&kind)
    }

    /// Required kinds absent from `present`
    ///
    /// Tools use this to tell a user why a system does not run.
    pub fn missing(&self, present: &[HashedName]) -> Vec<HashedName> {
        self.required
            .iter()
            .filter(|kind| !present.contains(kind))
            .copied()
            .collect()
    }

    /// Components out of `candidates` this request set should be bound to,
    /// `None` when a required kind is missing
    pub fn select(&self, candidates: &[ComponentHandle]) -> Option<Vec<ComponentHandle>> {
        let satisfied = self
            .required
            .iter()
            .all(|kind| candidates.iter().any(|c| c.kind == *kind));
        satisfied.then(|| {
            candidates
                .iter()
                .filter(|c| self.wants(c.kind))
                .copied()
                .collect()
        })
    }
}

/// Changes to report to one system
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct BindingDiff {
    pub removed: Vec<ComponentHandle>,
    pub added: Vec<ComponentHandle>,
}

impl BindingDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Components currently reported to one system
///
/// A system is attached while its requirements are met, even when that
/// leaves nothing to bind (a system without requests is always attached).
#[derive(Debug, Default)]
pub(crate) struct Binding {
    attached: bool,
    bound: Vec<ComponentHandle>,
}

impl Binding {
    /// Bring the bound set in line with `candidates`, returning what changed
    pub fn sync(&mut self, requests: &RequestedComponents, candidates: &[ComponentHandle]) -> BindingDiff {
        let selected = requests.select(candidates);
        self.attached = selected.is_some();
        let desired = selected.unwrap_or_default();
        let removed = self
            .bound
            .iter()
            .filter(|c| !desired.contains(c))
            .copied()
            .collect();
        let added = desired
            .iter()
            .filter(|c| !self.bound.contains(c))
            .copied()
            .collect();
        self.bound = desired;
        BindingDiff { removed, added }
    }

    /// Detach and drop every bound component, returning them
    pub fn clear(&mut self) -> Vec<ComponentHandle> {
        self.attached = false;
        std::mem::take(&mut self.bound)
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn bound(&self) -> &[ComponentHandle] {
        &self.bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::ComponentId;
    use slotmap::SlotMap;

    const ANIMATION: HashedName = HashedName::new("animation");
    const MESH: HashedName = HashedName::new("skeletal_mesh");
    const CLOTH: HashedName = HashedName::new("cloth");
    const AUDIO: HashedName = HashedName::new("audio");

    fn handles(kinds: &[HashedName]) -> Vec<ComponentHandle> {
        let mut ids: SlotMap<ComponentId, ()> = SlotMap::with_key();
        kinds
            .iter()
            .map(|kind| ComponentHandle { id: ids.insert(()), kind: *kind })
            .collect()
    }

    fn animation_requests() -> RequestedComponents {
        RequestedComponents::new()
            .require("animation")
            .require("skeletal_mesh")
            .optional("cloth")
    }

    #[test]
    fn test_missing_required_selects_nothing() {
        let candidates = handles(&[ANIMATION, CLOTH]);
        assert!(animation_requests().select(&candidates).is_none());
        assert_eq!(animation_requests().missing(&[ANIMATION, CLOTH]), vec![MESH]);
    }

    #[test]
    fn test_select_keeps_wanted_kinds_in_order() {
        let candidates = handles(&[CLOTH, AUDIO, MESH, ANIMATION]);
        let selected = animation_requests().select(&candidates).expect("requirements met");
        let kinds: Vec<_> = selected.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CLOTH, MESH, ANIMATION]);
    }

    #[test]
    fn test_binding_reports_only_differences() {
        let requests = animation_requests();
        let all = handles(&[ANIMATION, MESH, CLOTH]);
        let mut binding = Binding::default();

        // Requirements met without cloth
        let diff = binding.sync(&requests, &all[..2]);
        assert!(binding.is_attached());
        assert_eq!(diff.added, all[..2].to_vec());
        assert!(diff.removed.is_empty());

        // Optional component shows up
        let diff = binding.sync(&requests, &all);
        assert_eq!(diff.added, vec![all[2]]);
        assert!(diff.removed.is_empty());

        // Nothing changed
        assert!(binding.sync(&requests, &all).is_empty());

        // Losing a required kind unbinds everything
        let diff = binding.sync(&requests, &[all[1], all[2]]);
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, all);
        assert!(!binding.is_attached());
        assert!(binding.bound().is_empty());
    }

    #[test]
    fn test_no_requirements_is_always_attached() {
        let requests = RequestedComponents::new().optional("audio");
        let mut binding = Binding::default();

        assert!(binding.sync(&requests, &[]).is_empty());
        assert!(binding.is_attached());

        let candidates = handles(&[MESH, AUDIO]);
        let diff = binding.sync(&requests, &candidates);
        assert_eq!(diff.added, vec![candidates[1]]);
        assert_eq!(binding.clear(), vec![candidates[1]]);
        assert!(!binding.is_attached());
    }
}

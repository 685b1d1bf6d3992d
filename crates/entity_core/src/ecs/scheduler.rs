//! Update stages and priority ordered stage lists
//!
//! Every frame runs the same five stages in the same order. For each stage an
//! owner (entity or world) keeps a list of its systems sorted by ascending
//! priority number. Equal priorities keep their insertion order, and removal
//! never reorders the remaining entries, so the execution order of a stage is
//! fully determined by the sequence of `add`/`remove` calls.

use std::fmt;

use super::system::{EntitySystemKey, WorldSystemKey};

/// Fixed points in the frame where systems may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateStage {
    /// Input processing, pending loads
    StartFrame = 0,
    /// Game logic feeding the physics step
    BeforePhysics = 1,
    /// Physics simulation
    Physics = 2,
    /// Reactions to simulation results
    AfterPhysics = 3,
    /// Bookkeeping, deferred destruction
    EndFrame = 4,
}

impl UpdateStage {
    /// Number of stages
    pub const COUNT: usize = 5;

    /// All stages in execution order
    pub const ALL: [Self; Self::COUNT] = [
        Self::StartFrame,
        Self::BeforePhysics,
        Self::Physics,
        Self::AfterPhysics,
        Self::EndFrame,
    ];

    /// Position in the frame
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartFrame => "start_frame",
            Self::BeforePhysics => "before_physics",
            Self::Physics => "physics",
            Self::AfterPhysics => "after_physics",
            Self::EndFrame => "end_frame",
        };
        f.write_str(name)
    }
}

/// Stage/priority pairs a system asks to be scheduled in
///
/// Systems fill this in [`EntitySystem::register_updates`](super::EntitySystem::register_updates);
/// the owner does the actual insertion and removal, so a system never has to
/// remember to unschedule itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageRequests {
    entries: Vec<(UpdateStage, i32)>,
}

impl StageRequests {
    /// Empty request list
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to run in `stage` with `priority` (lower runs first)
    pub fn add(&mut self, stage: UpdateStage, priority: i32) -> &mut Self {
        self.entries.push((stage, priority));
        self
    }

    /// Requested pairs, in request order
    pub fn iter(&self) -> impl Iterator<Item = (UpdateStage, i32)> + '_ {
        self.entries.iter().copied()
    }

    /// Whether nothing was requested
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scheduled entry of a stage list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSystem<K> {
    /// System key in its owner
    pub system: K,
    /// Priority, lower runs first
    pub priority: i32,
}

/// Per-stage priority ordered lists of system keys
#[derive(Debug, Clone)]
pub struct UpdateSchedule<K> {
    stages: [Vec<ScheduledSystem<K>>; UpdateStage::COUNT],
}

/// Local scheduler of an entity
pub type EntitySystemUpdate = UpdateSchedule<EntitySystemKey>;

/// Global scheduler of a world
pub type WorldSystemUpdate = UpdateSchedule<WorldSystemKey>;

impl<K: Copy + PartialEq> UpdateSchedule<K> {
    /// Create empty stage lists
    pub fn new() -> Self {
        Self {
            stages: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Insert after every entry with a priority lower than or equal to `priority`
    ///
    /// Returns `false` if the system is already scheduled in this stage.
    pub fn add(&mut self, system: K, stage: UpdateStage, priority: i32) -> bool {
        let list = &mut self.stages[stage.index()];
        if list.iter().any(|entry| entry.system == system) {
            log::warn!("System already scheduled in stage {}", stage);
            return false;
        }
        let at = list.partition_point(|entry| entry.priority <= priority);
        list.insert(at, ScheduledSystem { system, priority });
        true
    }

    /// Remove a system from one stage, keeping the order of the others
    ///
    /// Returns `false` if it was not scheduled there.
    pub fn remove(&mut self, system: K, stage: UpdateStage) -> bool {
        let list = &mut self.stages[stage.index()];
        match list.iter().position(|entry| entry.system == system) {
            Some(at) => {
                list.remove(at);
                true
            }
            None => false,
        }
    }

    /// Schedule every requested stage of a system
    pub fn add_requests(&mut self, system: K, requests: &StageRequests) {
        for (stage, priority) in requests.iter() {
            self.add(system, stage, priority);
        }
    }

    /// Remove a system from every stage
    pub fn remove_all(&mut self, system: K) {
        for list in &mut self.stages {
            list.retain(|entry| entry.system != system);
        }
    }

    /// Systems of a stage in execution order
    pub fn stage(&self, stage: UpdateStage) -> &[ScheduledSystem<K>] {
        &self.stages[stage.index()]
    }

    /// Keys of a stage in execution order
    pub fn iter(&self, stage: UpdateStage) -> impl Iterator<Item = K> + '_ {
        self.stages[stage.index()].iter().map(|entry| entry.system)
    }

    /// Whether the system is scheduled in any stage
    pub fn contains(&self, system: K) -> bool {
        self.stages
            .iter()
            .any(|list| list.iter().any(|entry| entry.system == system))
    }

    /// Whether no stage has systems
    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        for list in &mut self.stages {
            list.clear();
        }
    }

    /// Invoke `run` for every system of a stage, low priority number first
    pub fn update(&self, stage: UpdateStage, mut run: impl FnMut(K)) {
        for entry in &self.stages[stage.index()] {
            run(entry.system);
        }
    }
}

impl<K: Copy + PartialEq> Default for UpdateSchedule<K> {
    fn default() -> Self {
        Self::new()
    }
}

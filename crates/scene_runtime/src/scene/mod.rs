//! Scene: registry, message bus and scheduler
//!
//! The [`Scene`] is the single owner of every entity and component in one
//! running simulation and the only source of truth for "what exists" and "who
//! is listening to what".
//!
//! ## Architecture
//!
//! ```text
//! host loop ──tick(delta, absolute)──▶ Scene
//!                                      ├─ delay queue   (scheduler.rs)
//!                                      ├─ entity arena  (graph.rs)
//!                                      │    └─ render tree links + indices
//!                                      ├─ component arena (components.rs)
//!                                      └─ message bus   (bus.rs)
//! ```
//!
//! Entities live in an id-keyed arena. An entity is *live* once it is
//! reachable from the root; only live entities are present in the id, tag and
//! flag indices. Components live in a slot map and are lent out to their own
//! hooks, which lets a hook mutate any part of the scene, including removing
//! itself.

mod bus;
mod components;
mod graph;
mod render_node;
mod scheduler;

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, warn};
use slotmap::{SecondaryMap, SlotMap};
use thiserror::Error;

use crate::config::SceneConfig;
use crate::ecs::{Action, ComponentId, Entity, EntityFlags, EntityId};
use crate::foundation::blackboard::Blackboard;

use components::ComponentSlot;
use scheduler::DelayedInvocation;

pub use render_node::RenderNode;

/// Passes over detached entities before `clear` gives up on teardown spawns
const CLEAR_SWEEPS: usize = 16;

/// Scene-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// No entity with this id was ever constructed in this scene, or it is gone
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),

    /// No component with this id is attached
    #[error("Unknown component {0:?}")]
    UnknownComponent(ComponentId),

    /// The child must be removed from its current parent first
    #[error("Entity {child} already has parent {parent}")]
    AlreadyParented {
        /// Entity being attached
        child: EntityId,
        /// Its current parent
        parent: EntityId,
    },

    /// Attaching would make an entity its own ancestor
    #[error("Attaching {child} under {parent} would create a cycle")]
    CyclicParenting {
        /// Requested parent
        parent: EntityId,
        /// Requested child
        child: EntityId,
    },

    /// The root cannot be attached anywhere
    #[error("The root entity cannot become a child")]
    RootCannotBeChild,

    /// Child index outside `0..=len`
    #[error("Child index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Current child count
        len: usize,
    },

    /// A transform in the parent chain cannot be inverted
    #[error("Entity {0} has a degenerate transform")]
    DegenerateTransform(EntityId),
}

/// Registry, message bus and scheduler for one running simulation
pub struct Scene {
    config: SceneConfig,
    root: EntityId,

    /// Every constructed entity, live or detached
    entities: HashMap<EntityId, Entity>,
    /// Entities reachable from the root
    live: HashSet<EntityId>,
    by_tag: HashMap<String, BTreeSet<EntityId>>,
    by_flag: HashMap<u32, BTreeSet<EntityId>>,

    components: SlotMap<ComponentId, ComponentSlot>,
    subscribers: HashMap<Action, Vec<ComponentId>>,
    subscriptions: SecondaryMap<ComponentId, HashSet<Action>>,

    delayed: Vec<DelayedInvocation>,
    blackboard: Blackboard,

    /// Bumped by `clear()` so in-flight traversals can tell the world changed
    generation: u64,
    absolute: f64,
}

impl Scene {
    /// Create a scene with default configuration
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create a scene with custom configuration
    pub fn with_config(config: SceneConfig) -> Self {
        let root = Entity::new(config.root_tag.clone());
        let root_id = root.id();
        let mut scene = Self {
            config,
            root: root_id,
            entities: HashMap::new(),
            live: HashSet::new(),
            by_tag: HashMap::new(),
            by_flag: HashMap::new(),
            components: SlotMap::with_key(),
            subscribers: HashMap::new(),
            subscriptions: SecondaryMap::new(),
            delayed: Vec::new(),
            blackboard: Blackboard::new(),
            generation: 0,
            absolute: 0.0,
        };
        scene.entities.insert(root_id, root);
        scene.register(root_id);
        scene
    }

    fn spawn_root(&mut self) -> EntityId {
        let root = Entity::new(self.config.root_tag.clone());
        let id = root.id();
        self.entities.insert(id, root);
        self.register(id);
        id
    }

    /// Scene configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The root entity id
    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Simulation time passed to the most recent tick
    pub fn absolute_time(&self) -> f64 {
        self.absolute
    }

    /// Construct a detached entity
    ///
    /// It becomes live, and findable through the indices, once attached under a
    /// live entity.
    pub fn create_entity(&mut self, tag: impl Into<String>) -> EntityId {
        let entity = Entity::new(tag);
        let id = entity.id();
        self.entities.insert(id, entity);
        id
    }

    /// Any constructed entity, live or detached
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Any constructed entity, mutably
    ///
    /// Tag and flags are read-only here; change them through the scene so the
    /// indices follow.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Live entity by id
    pub fn find_by_id(&self, id: EntityId) -> Option<&Entity> {
        if self.live.contains(&id) {
            self.entities.get(&id)
        } else {
            None
        }
    }

    /// Live entity by id, mutably
    pub fn find_by_id_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if self.live.contains(&id) {
            self.entities.get_mut(&id)
        } else {
            None
        }
    }

    /// Whether the entity is reachable from the root
    pub fn is_live(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }

    /// Number of live entities, root included
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Ids of all live entities in ascending order
    pub fn live_entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.live.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Earliest created live entity with this tag
    pub fn find_first_by_tag(&self, tag: &str) -> Option<EntityId> {
        self.by_tag.get(tag).and_then(|ids| ids.first().copied())
    }

    /// All live entities with this tag, in creation order
    pub fn find_all_by_tag(&self, tag: &str) -> Vec<EntityId> {
        self.by_tag
            .get(tag)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All live entities carrying every bit of `flags`, in creation order
    ///
    /// An empty flag set matches nothing.
    pub fn find_all_by_flag(&self, flags: EntityFlags) -> Vec<EntityId> {
        let mut sets = flags.single_bits().map(|bit| self.by_flag.get(&bit));
        let Some(Some(first)) = sets.next() else {
            return Vec::new();
        };
        let mut result: BTreeSet<EntityId> = first.clone();
        for set in sets {
            match set {
                Some(set) => result.retain(|id| set.contains(id)),
                None => return Vec::new(),
            }
        }
        result.into_iter().collect()
    }

    /// Change an entity's tag, keeping the tag index in sync
    pub fn set_tag(&mut self, id: EntityId, tag: impl Into<String>) -> Result<(), SceneError> {
        let tag = tag.into();
        let live = self.live.contains(&id);
        let entity = self.entities.get_mut(&id).ok_or(SceneError::UnknownEntity(id))?;
        let old = entity.set_tag(tag.clone());
        if live {
            self.unindex_tag(id, &old);
            self.by_tag.entry(tag).or_default().insert(id);
        }
        Ok(())
    }

    /// Set flag bits on an entity; no-op for unknown ids
    pub fn set_flag(&mut self, id: EntityId, flag: EntityFlags) {
        self.update_flags(id, |flags| flags.insert(flag));
    }

    /// Clear flag bits on an entity; no-op for unknown ids
    pub fn reset_flag(&mut self, id: EntityId, flag: EntityFlags) {
        self.update_flags(id, |flags| flags.remove(flag));
    }

    /// Toggle flag bits on an entity; no-op for unknown ids
    pub fn invert_flag(&mut self, id: EntityId, flag: EntityFlags) {
        self.update_flags(id, |flags| flags.toggle(flag));
    }

    /// Whether the entity carries every bit of `flag`; `false` for unknown ids
    pub fn has_flag(&self, id: EntityId, flag: EntityFlags) -> bool {
        self.entities.get(&id).is_some_and(|e| e.has_flag(flag))
    }

    fn update_flags(&mut self, id: EntityId, change: impl FnOnce(&mut EntityFlags)) {
        let live = self.live.contains(&id);
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        let before = entity.flags();
        change(entity.flags_mut());
        let after = entity.flags();
        if !live || before == after {
            return;
        }
        for bit in (before - after).single_bits() {
            self.unindex_flag_bit(id, bit);
        }
        for bit in (after - before).single_bits() {
            self.by_flag.entry(bit).or_default().insert(id);
        }
    }

    /// Typed resources shared across the scene
    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Typed resources shared across the scene, mutably
    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    /// Tear everything down and start over with an empty root
    ///
    /// Every component receives its `on_finish`/`on_remove`; indices, the delay
    /// queue and the blackboard are emptied.
    pub fn clear(&mut self) {
        debug!(
            "Clearing scene: {} live entities, {} components, {} pending invocations",
            self.live.len(),
            self.components.len(),
            self.delayed.len()
        );
        self.generation += 1;
        self.delayed.clear();

        let root = self.root;
        self.destroy(root);

        // teardown hooks may spawn entities of their own; sweep until none are left
        for _ in 0..CLEAR_SWEEPS {
            let detached: Vec<EntityId> = self
                .entities
                .values()
                .filter(|e| e.parent.is_none())
                .map(Entity::id)
                .collect();
            if detached.is_empty() {
                break;
            }
            for id in detached {
                self.destroy(id);
            }
        }
        if !self.entities.is_empty() {
            warn!("Teardown kept spawning entities; dropping {} more", self.entities.len());
        }
        let leftover: Vec<ComponentId> = self.components.keys().collect();
        for id in leftover {
            self.remove_component(id);
        }

        self.entities.clear();
        self.live.clear();
        self.by_tag.clear();
        self.by_flag.clear();
        self.subscribers.clear();
        self.subscriptions.clear();
        self.delayed.clear();
        self.blackboard.clear();

        self.root = self.spawn_root();
    }

    fn unindex_tag(&mut self, id: EntityId, tag: &str) {
        if let Some(ids) = self.by_tag.get_mut(tag) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_tag.remove(tag);
            }
        }
    }

    fn unindex_flag_bit(&mut self, id: EntityId, bit: u32) {
        if let Some(ids) = self.by_flag.get_mut(&bit) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_flag.remove(&bit);
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("root", &self.root)
            .field("entities", &self.entities.len())
            .field("live", &self.live.len())
            .field("components", &self.components.len())
            .field("pending_invocations", &self.delayed.len())
            .finish_non_exhaustive()
    }
}

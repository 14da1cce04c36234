//! Fluent entity assembly
//!
//! ```rust
//! use scene_runtime::prelude::*;
//!
//! let mut scene = Scene::new();
//! let root = scene.root();
//! let mut builder = EntityBuilder::new();
//! let ship = builder
//!     .tag("ship")
//!     .content_size(32.0, 16.0)
//!     .anchor(0.5, 0.5)
//!     .relative_pos(0.5, 0.9)
//!     .flag(EntityFlags::COLLIDABLE)
//!     .build(&mut scene, root)
//!     .unwrap();
//! assert_eq!(scene.find_first_by_tag("ship"), Some(ship));
//! ```

use std::any::Any;
use std::fmt;
use std::mem;

use log::trace;
use thiserror::Error;

use crate::ecs::{Component, EntityFlags, EntityId};
use crate::foundation::math::Vec2;
use crate::scene::{Scene, SceneError};

/// How the builder positions the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// Position in the parent's space
    Local,
    /// Fraction of the viewport, converted into the parent's space
    Relative,
    /// Global position, converted into the parent's space
    Global,
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Relative => "relative",
            Self::Global => "global",
        })
    }
}

/// Builder errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// More than one placement mode was requested for the same entity
    #[error("Conflicting placement: {first} position already set, got {second}")]
    ConflictingPlacement {
        /// Mode set first
        first: PlacementMode,
        /// Mode that conflicted with it
        second: PlacementMode,
    },

    /// A scene operation failed while building
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    mode: PlacementMode,
    value: Vec2,
}

#[derive(Default)]
struct Pending {
    tag: Option<String>,
    state: Option<i32>,
    flags: EntityFlags,
    attributes: Vec<(String, Box<dyn Any>)>,
    components: Vec<Box<dyn Component>>,
    content_size: Option<Vec2>,
    scale: Option<Vec2>,
    anchor: Option<Vec2>,
    placement: Option<Placement>,
    conflict: Option<(PlacementMode, PlacementMode)>,
}

/// Assembles one fully configured entity per terminal call
///
/// Configuration calls may come in any order. Each terminal call (`build`,
/// `build_into`, `build_detached`) consumes the accumulated configuration, so
/// the same builder can be reused for the next entity whether or not the
/// build succeeded.
#[derive(Default)]
pub struct EntityBuilder {
    pending: Pending,
}

impl EntityBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Position in the parent's local space
    pub fn local_pos(&mut self, x: f32, y: f32) -> &mut Self {
        self.place(PlacementMode::Local, Vec2::new(x, y))
    }

    /// Position as a fraction of the viewport (`0.5, 0.5` is the center)
    pub fn relative_pos(&mut self, x: f32, y: f32) -> &mut Self {
        self.place(PlacementMode::Relative, Vec2::new(x, y))
    }

    /// Position in global space
    pub fn global_pos(&mut self, x: f32, y: f32) -> &mut Self {
        self.place(PlacementMode::Global, Vec2::new(x, y))
    }

    fn place(&mut self, mode: PlacementMode, value: Vec2) -> &mut Self {
        if let Some(existing) = self.pending.placement {
            if existing.mode != mode && self.pending.conflict.is_none() {
                self.pending.conflict = Some((existing.mode, mode));
            }
        }
        self.pending.placement = Some(Placement { mode, value });
        self
    }

    /// Pivot as a fraction of the node's measured size
    pub fn anchor(&mut self, x: f32, y: f32) -> &mut Self {
        self.pending.anchor = Some(Vec2::new(x, y));
        self
    }

    /// Uniform scale
    pub fn scale(&mut self, factor: f32) -> &mut Self {
        self.scale_xy(factor, factor)
    }

    /// Per-axis scale
    pub fn scale_xy(&mut self, x: f32, y: f32) -> &mut Self {
        self.pending.scale = Some(Vec2::new(x, y));
        self
    }

    /// Measured content size (text extent, sprite size)
    pub fn content_size(&mut self, width: f32, height: f32) -> &mut Self {
        self.pending.content_size = Some(Vec2::new(width, height));
        self
    }

    /// Entity tag
    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.pending.tag = Some(tag.into());
        self
    }

    /// Initial state value
    pub fn state(&mut self, state: i32) -> &mut Self {
        self.pending.state = Some(state);
        self
    }

    /// Add flag bits; repeated calls accumulate
    pub fn flag(&mut self, flag: EntityFlags) -> &mut Self {
        self.pending.flags |= flag;
        self
    }

    /// Set an attribute; a repeated key keeps the last value
    pub fn attribute<T: 'static>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        let value: Box<dyn Any> = Box::new(value);
        self.pending.attributes.push((key.into(), value));
        self
    }

    /// Queue a component; components are attached in the order queued
    pub fn component<C: Component>(&mut self, component: C) -> &mut Self {
        self.pending.components.push(Box::new(component));
        self
    }

    /// Build a new entity and attach it under `parent`
    pub fn build(&mut self, scene: &mut Scene, parent: EntityId) -> Result<EntityId, BuildError> {
        self.finish(scene, None, Some(parent))
    }

    /// Apply the configuration to an existing entity, optionally parenting it
    pub fn build_into(
        &mut self,
        scene: &mut Scene,
        target: EntityId,
        parent: Option<EntityId>,
    ) -> Result<EntityId, BuildError> {
        self.finish(scene, Some(target), parent)
    }

    /// Build a new entity without parenting it
    ///
    /// Placement is resolved in global space.
    pub fn build_detached(&mut self, scene: &mut Scene) -> Result<EntityId, BuildError> {
        self.finish(scene, None, None)
    }

    fn finish(
        &mut self,
        scene: &mut Scene,
        target: Option<EntityId>,
        parent: Option<EntityId>,
    ) -> Result<EntityId, BuildError> {
        let pending = mem::take(&mut self.pending);
        if let Some((first, second)) = pending.conflict {
            return Err(BuildError::ConflictingPlacement { first, second });
        }
        // parenting is validated before anything is mutated
        match (target, parent) {
            (Some(target), Some(parent)) => scene.check_parenting(parent, target)?,
            (None, Some(parent)) if scene.entity(parent).is_none() => {
                return Err(SceneError::UnknownEntity(parent).into());
            }
            _ => {}
        }
        let existing_parent = match target {
            Some(id) => scene.entity(id).ok_or(SceneError::UnknownEntity(id))?.parent(),
            None => None,
        };
        // placement is expressed in the space of the parent the node ends up under
        let position = match pending.placement {
            Some(placement) => Some(resolve(scene, placement, parent.or(existing_parent))?),
            None => None,
        };
        let id = match target {
            Some(id) => id,
            None => scene.create_entity(String::new()),
        };

        if let Some(tag) = pending.tag {
            scene.set_tag(id, tag)?;
        }
        if !pending.flags.is_empty() {
            scene.set_flag(id, pending.flags);
        }
        let entity = scene.entity_mut(id).ok_or(SceneError::UnknownEntity(id))?;
        if let Some(state) = pending.state {
            entity.set_state(state);
        }
        for (key, value) in pending.attributes {
            entity.attributes_mut().set_boxed(key, value);
        }

        let node = entity.node_mut();
        if let Some(size) = pending.content_size {
            node.size = size;
        }
        if let Some(scale) = pending.scale {
            node.scale = scale;
        }
        if let Some(position) = position {
            node.position = position;
        }
        if let Some(anchor) = pending.anchor {
            node.set_anchor(anchor);
        }

        for component in pending.components {
            scene.add_boxed_component(id, component)?;
        }
        if let Some(parent) = parent {
            scene.add_child(parent, id)?;
        }
        trace!("Built entity {id}");
        Ok(id)
    }
}

fn resolve(
    scene: &Scene,
    placement: Placement,
    space: Option<EntityId>,
) -> Result<Vec2, SceneError> {
    let global = match placement.mode {
        PlacementMode::Local => return Ok(placement.value),
        PlacementMode::Relative => {
            let viewport = Vec2::new(scene.config().viewport_width, scene.config().viewport_height);
            placement.value.component_mul(&viewport)
        }
        PlacementMode::Global => placement.value,
    };
    match space {
        Some(parent) => scene.to_local(parent, global),
        None => Ok(global),
    }
}

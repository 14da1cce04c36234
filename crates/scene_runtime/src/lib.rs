//! # Scene Runtime
//!
//! Entity/component/scene runtime for 2D games built on a render tree.
//!
//! ## Features
//!
//! - **Scene Registry**: id, tag and flag indices kept in sync with the render tree
//! - **Components**: lifecycle hooks (`on_init`, `on_update`, `on_message`,
//!   `on_finish`, `on_remove`) with full scene access through a [`Context`](ecs::Context)
//! - **Message Bus**: synchronous publish/subscribe with wildcard listeners
//! - **Scheduler**: per-tick update traversal and a delay queue
//! - **Builder**: fluent assembly of fully configured entities
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_runtime::prelude::*;
//!
//! struct Health(i32);
//!
//! impl Component for Health {
//!     fn on_init(&mut self, ctx: &mut Context<'_>) -> HookResult {
//!         ctx.subscribe(["hit"]);
//!         Ok(())
//!     }
//!
//!     fn on_message(&mut self, ctx: &mut Context<'_>, msg: &Message) -> HookResult {
//!         self.0 -= msg.payload().as_int().unwrap_or(1) as i32;
//!         if self.0 <= 0 {
//!             let owner = ctx.owner();
//!             ctx.scene_mut().destroy_entity(owner);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut scene = Scene::new();
//! let root = scene.root();
//! let enemy = EntityBuilder::new()
//!     .tag("enemy")
//!     .component(Health(1))
//!     .build(&mut scene, root)
//!     .unwrap();
//!
//! scene.send_message(&Message::new("hit"));
//! assert!(!scene.is_live(enemy));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::must_use_candidate)]

pub mod builder;
pub mod config;
pub mod ecs;
pub mod foundation;
pub mod scene;

pub use builder::{BuildError, EntityBuilder, PlacementMode};
pub use scene::{Scene, SceneError};

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        builder::{BuildError, EntityBuilder, PlacementMode},
        config::{Config, ConfigError, SceneConfig},
        ecs::{
            Action, Component, ComponentError, ComponentId, Context, Entity, EntityFlags, EntityId,
            HookResult, Message, Payload,
        },
        foundation::{
            blackboard::Blackboard,
            math::{Bounds, Vec2},
            time::FrameClock,
        },
        scene::{RenderNode, Scene, SceneError},
    };
}

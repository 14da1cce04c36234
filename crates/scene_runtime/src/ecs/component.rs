//! Component trait and hook context
//!
//! A component is one attachable unit of behavior. Every hook has a no-op
//! default; hooks receive a [`Context`] that gives access to the owning scene,
//! so components never store back-pointers to their entity or scene.

use std::any::Any;

use slotmap::new_key_type;
use thiserror::Error;

use super::entity::{Entity, EntityFlags, EntityId};
use super::message::{Action, Message, Payload};
use crate::scene::{Scene, SceneError};

new_key_type! {
    /// Component identifier (unique within its scene, never reissued)
    pub struct ComponentId;
}

/// Failure reported by a component hook
///
/// The scene logs these and keeps running the remaining components.
#[derive(Error, Debug)]
pub enum ComponentError {
    /// Generic failure with a reason
    #[error("{0}")]
    Failed(String),

    /// The component expects a sibling component that is not attached
    #[error("{component} requires {needs} on the same entity")]
    MissingDependency {
        /// Name of the failing component
        component: &'static str,
        /// Name of the missing sibling
        needs: &'static str,
    },

    /// A scene operation performed by the hook failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Result type returned by every hook
pub type HookResult = Result<(), ComponentError>;

/// Access to a component as [`Any`] for typed lookups
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`
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

/// Base behavior unit
///
/// Hook order for a single component:
/// `on_init` once, then `on_update` every tick while not finished and
/// `on_message` for every subscribed action, `on_finish` at most once, and
/// `on_remove` exactly once when detached (always after `on_finish`).
pub trait Component: AsAny {
    /// Name used for lookups and log lines
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Called once, right after the component is attached to its owner
    fn on_init(&mut self, _ctx: &mut Context<'_>) -> HookResult {
        Ok(())
    }

    /// Called once per tick while attached and not finished
    ///
    /// `delta` is milliseconds since the previous tick, `absolute` the
    /// cumulative simulation time, both as supplied by the host loop.
    fn on_update(&mut self, _ctx: &mut Context<'_>, _delta: f64, _absolute: f64) -> HookResult {
        Ok(())
    }

    /// Called synchronously for each message on a subscribed action
    fn on_message(&mut self, _ctx: &mut Context<'_>, _msg: &Message) -> HookResult {
        Ok(())
    }

    /// Called once when the component is finished
    fn on_finish(&mut self, _ctx: &mut Context<'_>) -> HookResult {
        Ok(())
    }

    /// Called once when the component is detached from its owner
    fn on_remove(&mut self, _ctx: &mut Context<'_>) -> HookResult {
        Ok(())
    }
}

/// Hook-time view of the scene from one component's perspective
pub struct Context<'a> {
    scene: &'a mut Scene,
    component: ComponentId,
    owner: EntityId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(scene: &'a mut Scene, component: ComponentId, owner: EntityId) -> Self {
        Self {
            scene,
            component,
            owner,
        }
    }

    /// Id of the component this context belongs to
    pub fn id(&self) -> ComponentId {
        self.component
    }

    /// Id of the owning entity
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Shared scene access
    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    /// Mutable scene access
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    /// The owning entity (live or still detached)
    pub fn entity(&self) -> Option<&Entity> {
        self.scene.entity(self.owner)
    }

    /// The owning entity, mutably
    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        self.scene.entity_mut(self.owner)
    }

    /// Subscribe this component to one or more actions (idempotent)
    pub fn subscribe<I, A>(&mut self, actions: I)
    where
        I: IntoIterator<Item = A>,
        A: Into<Action>,
    {
        for action in actions {
            self.scene.subscribe(self.component, action);
        }
    }

    /// Unsubscribe this component from one or more actions (idempotent)
    pub fn unsubscribe<I, A>(&mut self, actions: I)
    where
        I: IntoIterator<Item = A>,
        A: Into<Action>,
    {
        for action in actions {
            self.scene.unsubscribe(self.component, action);
        }
    }

    /// Publish a message with this component as source and its owner as origin
    ///
    /// Returns the number of recipients it was handed to. A recipient whose
    /// own hook is still running, this component included, handles it as soon
    /// as that hook returns.
    pub fn send_message(&mut self, action: impl Into<Action>, payload: Payload) -> usize {
        let msg = Message::new(action)
            .with_source(self.component)
            .with_origin(self.owner)
            .with_payload(payload);
        self.scene.send_message(&msg)
    }

    /// Mark this component finished; it stays attached but stops updating
    pub fn finish(&mut self) {
        self.scene.finish_component(self.component);
    }

    /// Detach this component from its owner
    ///
    /// Completes right after the running hook returns.
    pub fn remove_self(&mut self) {
        self.scene.remove_component(self.component);
    }

    /// Set a flag on the owner
    pub fn set_flag(&mut self, flag: EntityFlags) {
        self.scene.set_flag(self.owner, flag);
    }

    /// Schedule a callback on the scene's delay queue
    pub fn invoke_with_delay<F>(&mut self, delay_ms: f64, callback: F)
    where
        F: FnOnce(&mut Scene) + 'static,
    {
        self.scene.invoke_with_delay(delay_ms, callback);
    }
}

//! Entity and component building blocks
//!
//! The data types the scene operates on: entities, the component trait and its
//! hook context, attribute storage and the message envelope.

pub mod attributes;
pub mod component;
pub mod entity;
pub mod message;

pub use attributes::Attributes;
pub use component::{AsAny, Component, ComponentError, ComponentId, Context, HookResult};
pub use entity::{Entity, EntityFlags, EntityId};
pub use message::{Action, Message, Payload};

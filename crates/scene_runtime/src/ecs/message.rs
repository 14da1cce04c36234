//! Message envelope for the scene's synchronous bus
//!
//! Shaped after the engine's event type: an identifying action plus typed
//! arguments, built with `with_*` calls. Payloads are a closed set of variants
//! so handlers can match on them; `Payload::Custom` covers game-specific data.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use super::component::ComponentId;
use super::entity::EntityId;
use crate::foundation::math::Vec2;

/// Action identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Action(Cow<'static, str>);

impl Action {
    /// Wildcard: subscribers to this action receive every message
    pub const ANY: Action = Action(Cow::Borrowed("*"));

    /// Create an action from a static name
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Action name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the wildcard action
    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl From<&'static str> for Action {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&Action> for Action {
    fn from(action: &Action) -> Self {
        action.clone()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message payload
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No data
    #[default]
    Empty,
    /// Boolean switch
    Bool(bool),
    /// Integer value (scores, counts, damage)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text
    Text(String),
    /// Reference to another entity
    Entity(EntityId),
    /// 2D position or direction
    Point(Vec2),
    /// Game-specific data, read back with [`Payload::custom`]
    Custom(Rc<dyn Any>),
}

impl Payload {
    /// Wrap an arbitrary value
    pub fn custom<T: 'static>(value: T) -> Self {
        Self::Custom(Rc::new(value))
    }

    /// Typed view of a `Custom` payload
    pub fn as_custom<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Custom(value) => value.downcast_ref(),
            _ => None,
        }
    }

    /// Integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Entity payload, if any
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether the payload carries no data
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Immutable message envelope
#[derive(Debug, Clone)]
pub struct Message {
    action: Action,
    source: Option<ComponentId>,
    origin: Option<EntityId>,
    payload: Payload,
}

impl Message {
    /// Create a message with no source, origin or payload
    pub fn new(action: impl Into<Action>) -> Self {
        Self {
            action: action.into(),
            source: None,
            origin: None,
            payload: Payload::Empty,
        }
    }

    /// Attach a payload (builder pattern)
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Record the sending component (builder pattern)
    pub fn with_source(mut self, source: ComponentId) -> Self {
        self.source = Some(source);
        self
    }

    /// Record the originating entity (builder pattern)
    pub fn with_origin(mut self, origin: EntityId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Action this message is published under
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Sending component
    pub fn source(&self) -> Option<ComponentId> {
        self.source
    }

    /// Entity the message originates from
    pub fn origin(&self) -> Option<EntityId> {
        self.origin
    }

    /// Payload data
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Damage {
        amount: u32,
    }

    #[test]
    fn test_custom_payload_downcast() {
        let msg = Message::new("hit").with_payload(Payload::custom(Damage { amount: 7 }));
        assert_eq!(msg.payload().as_custom::<Damage>(), Some(&Damage { amount: 7 }));
        assert!(msg.payload().as_custom::<u32>().is_none());
        assert!(msg.payload().as_int().is_none());
    }

    #[test]
    fn test_action_identity() {
        assert_eq!(Action::from("hit"), Action::from(String::from("hit")));
        assert!(Action::ANY.is_any());
        assert!(!Action::new("hit").is_any());
        assert_eq!(Message::new("hit").action().as_str(), "hit");
    }
}

//! Entity implementation
//!
//! An [`Entity`] is the logical proxy for exactly one node of the render tree.
//! It carries the identity (id, tag), the categorical data (flags, state,
//! attributes) and the list of components it owns. Structural links (parent,
//! children) mirror the render tree and are only mutated through the
//! [`Scene`](crate::scene::Scene), which keeps its indices in sync.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use super::attributes::Attributes;
use super::component::ComponentId;
use crate::scene::RenderNode;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Entity identifier
///
/// Allocated from a process-wide monotonic counter: ids are never reused, even
/// across [`Scene::clear`](crate::scene::Scene::clear) or between scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Categorical group membership of an entity
    ///
    /// A handful of conventional bits are named; games define their own with
    /// [`EntityFlags::custom`]. Unnamed bits are retained and indexed like
    /// named ones.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntityFlags: u32 {
        /// Takes part in collision queries
        const COLLIDABLE = 1 << 0;
        /// Short-lived moving object fired by another entity
        const PROJECTILE = 1 << 1;
        /// Never moves once placed
        const STATIC = 1 << 2;
    }
}

impl EntityFlags {
    /// Flag for an arbitrary bit (0..32)
    ///
    /// # Panics
    ///
    /// Panics if `bit` is 32 or more.
    pub const fn custom(bit: u32) -> Self {
        assert!(bit < u32::BITS, "flag bit out of range");
        Self::from_bits_retain(1 << bit)
    }

    /// Iterate the individual bits set in this flag set
    pub(crate) fn single_bits(self) -> impl Iterator<Item = u32> {
        let bits = self.bits();
        (0..u32::BITS).filter(move |bit| bits & (1 << bit) != 0)
    }
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// One addressable simulation object
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    tag: String,
    flags: EntityFlags,
    state: i32,
    attributes: Attributes,
    components: Vec<ComponentId>,
    node: RenderNode,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
}

impl Entity {
    /// Construct a detached entity with a freshly allocated id
    pub(crate) fn new(tag: impl Into<String>) -> Self {
        Self {
            id: EntityId::next(),
            tag: tag.into(),
            flags: EntityFlags::empty(),
            state: 0,
            attributes: Attributes::new(),
            components: Vec::new(),
            node: RenderNode::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Get the entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Group tag (not unique)
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub(crate) fn set_tag(&mut self, tag: String) -> String {
        std::mem::replace(&mut self.tag, tag)
    }

    /// Current flag set
    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    /// Check whether every bit of `flag` is set
    pub fn has_flag(&self, flag: EntityFlags) -> bool {
        self.flags.contains(flag)
    }

    pub(crate) fn flags_mut(&mut self) -> &mut EntityFlags {
        &mut self.flags
    }

    /// Opaque state value, meaning defined by the owning game
    pub fn state(&self) -> i32 {
        self.state
    }

    /// Plain assignment, no validation
    pub fn set_state(&mut self, state: i32) {
        self.state = state;
    }

    /// Untyped attribute map
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Mutable untyped attribute map
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Typed attribute read; `None` on a missing key or a type mismatch
    pub fn attribute<T: 'static>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key)
    }

    /// Store an attribute, replacing any previous value under `key`
    pub fn set_attribute<T: 'static>(&mut self, key: impl Into<String>, value: T) {
        self.attributes.set(key, value);
    }

    /// Remove an attribute; returns whether the key existed
    pub fn remove_attribute(&mut self, key: &str) -> bool {
        self.attributes.remove(key)
    }

    /// Owned components in insertion order
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub(crate) fn push_component(&mut self, id: ComponentId) {
        self.components.push(id);
    }

    pub(crate) fn drop_component(&mut self, id: ComponentId) -> bool {
        let before = self.components.len();
        self.components.retain(|c| *c != id);
        before != self.components.len()
    }

    /// Render-tree node geometry
    pub fn node(&self) -> &RenderNode {
        &self.node
    }

    /// Mutable render-tree node geometry
    pub fn node_mut(&mut self) -> &mut RenderNode {
        &mut self.node
    }

    /// Parent entity, if attached
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in render-tree order
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let a = Entity::new("a");
        let b = Entity::new("b");
        assert!(b.id() > a.id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_custom_flags_are_retained() {
        let mut flags = EntityFlags::COLLIDABLE;
        flags.insert(EntityFlags::custom(9));
        assert!(flags.contains(EntityFlags::custom(9)));
        assert_eq!(flags.single_bits().collect::<Vec<_>>(), vec![0, 9]);
    }

    #[test]
    #[should_panic(expected = "flag bit out of range")]
    fn test_custom_flag_bit_out_of_range() {
        let _ = EntityFlags::custom(std::hint::black_box(32));
    }

    #[test]
    fn test_state_and_attributes() {
        let mut entity = Entity::new("ship");
        entity.set_state(3);
        entity.set_attribute("lives", 2u8);
        assert_eq!(entity.state(), 3);
        assert_eq!(entity.attribute::<u8>("lives"), Some(&2));
        assert_eq!(entity.attribute::<i32>("lives"), None);
        assert!(entity.remove_attribute("lives"));
        assert!(!entity.remove_attribute("lives"));
    }
}

//! Typed shared resources
//!
//! Game-wide singletons (score keepers, level descriptors, lookup tables) are
//! stored here keyed by their type and reached through the scene, so no
//! component has to dig them out of an untyped attribute map.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Type-keyed resource map, at most one value per type
#[derive(Default)]
pub struct Blackboard {
    resources: HashMap<TypeId, Box<dyn Any>>,
}

impl Blackboard {
    /// Create an empty blackboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource; returns the previous value of the same type
    pub fn insert<T: 'static>(&mut self, value: T) -> Option<T> {
        self.resources
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast().ok())
            .map(|old| *old)
    }

    /// Borrow a resource
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.resources.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Borrow a resource mutably
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    /// Get a resource, inserting `T::default()` first if absent
    pub fn get_or_default<T: Default + 'static>(&mut self) -> &mut T {
        let entry = self
            .resources
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match entry.downcast_mut() {
            Some(value) => value,
            None => unreachable!("blackboard entry keyed by TypeId holds another type"),
        }
    }

    /// Take a resource out
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok())
            .map(|value| *value)
    }

    /// Whether a resource of type `T` is present
    pub fn contains<T: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Drop every resource
    pub fn clear(&mut self) {
        self.resources.clear();
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blackboard")
            .field("resources", &self.resources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Score(u32);

    #[test]
    fn test_insert_replace_remove() {
        let mut board = Blackboard::new();
        assert!(board.insert(Score(1)).is_none());
        assert_eq!(board.insert(Score(5)), Some(Score(1)));
        assert_eq!(board.get::<Score>(), Some(&Score(5)));
        assert_eq!(board.remove::<Score>(), Some(Score(5)));
        assert!(!board.contains::<Score>());
    }

    #[test]
    fn test_get_or_default() {
        let mut board = Blackboard::new();
        board.get_or_default::<Score>().0 += 3;
        board.get_or_default::<Score>().0 += 4;
        assert_eq!(board.get::<Score>(), Some(&Score(7)));
        assert_eq!(board.len(), 1);
    }
}

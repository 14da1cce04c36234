//! String-keyed attribute storage attached to each entity
//!
//! Values are stored type-erased; reads name the expected type and get `None`
//! back for both a missing key and a value of another type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Heterogeneous attribute map (string key → any value)
#[derive(Default)]
pub struct Attributes {
    values: HashMap<String, Box<dyn Any>>,
}

impl Attributes {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed read
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref()
    }

    /// Typed mutable read
    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key)?.downcast_mut()
    }

    /// Store a value, replacing whatever was under `key`
    pub fn set<T: 'static>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Store an already boxed value
    pub fn set_boxed(&mut self, key: impl Into<String>, value: Box<dyn Any>) {
        self.values.insert(key.into(), value);
    }

    /// Remove a key; returns whether it was present
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Check for a key regardless of value type
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored attributes
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate the keys in arbitrary order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

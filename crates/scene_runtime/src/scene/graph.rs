//! Render-tree structure and index registration
//!
//! Every child-list mutation funnels into `on_child_added` /
//! `on_child_removed`, which keep the id, tag and flag indices equal to the set
//! of entities reachable from the root. Indices are updated incrementally;
//! only `clear()` starts from scratch.

use std::ops::Range;

use log::{trace, warn};

use super::{Scene, SceneError};
use crate::ecs::EntityId;
use crate::foundation::math::{transform_point, Mat3, Vec2};

impl Scene {
    /// Append `child` to `parent`'s children
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), SceneError> {
        let len = self.entity(parent).ok_or(SceneError::UnknownEntity(parent))?.children.len();
        self.insert_child_at(parent, child, len)
    }

    /// Insert `child` at `index` in `parent`'s children
    ///
    /// The child must be unparented. If `parent` is live, the whole subtree
    /// under `child` becomes live.
    pub fn insert_child_at(
        &mut self,
        parent: EntityId,
        child: EntityId,
        index: usize,
    ) -> Result<(), SceneError> {
        self.check_parenting(parent, child)?;
        let len = self.entity(parent).map_or(0, |p| p.children.len());
        if index > len {
            return Err(SceneError::IndexOutOfRange { index, len });
        }

        if let Some(p) = self.entities.get_mut(&parent) {
            p.children.insert(index, child);
        }
        if let Some(c) = self.entities.get_mut(&child) {
            c.parent = Some(parent);
        }
        self.on_child_added(parent, child);
        Ok(())
    }

    /// Whether `child` could be attached under `parent` right now
    ///
    /// Both must exist, `child` must be unparented and not the root, and
    /// `parent` must not sit inside `child`'s subtree.
    pub fn check_parenting(&self, parent: EntityId, child: EntityId) -> Result<(), SceneError> {
        let entity = self.entities.get(&child).ok_or(SceneError::UnknownEntity(child))?;
        if !self.entities.contains_key(&parent) {
            return Err(SceneError::UnknownEntity(parent));
        }
        if child == self.root {
            return Err(SceneError::RootCannotBeChild);
        }
        if let Some(current) = entity.parent {
            return Err(SceneError::AlreadyParented { child, parent: current });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::CyclicParenting { parent, child });
        }
        Ok(())
    }

    /// Detach `child` from `parent` and destroy it
    ///
    /// Returns `false` (and does nothing) if `child` is not currently a child
    /// of `parent`, which makes repeated removal a no-op.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        let Some(p) = self.entities.get_mut(&parent) else {
            return false;
        };
        let Some(pos) = p.children.iter().position(|c| *c == child) else {
            return false;
        };
        p.children.remove(pos);
        if let Some(c) = self.entities.get_mut(&child) {
            c.parent = None;
        }
        self.on_child_removed(parent, child);
        true
    }

    /// Detach and destroy the children of `parent` in `range`
    ///
    /// Returns the removed ids in their former order.
    pub fn remove_children(
        &mut self,
        parent: EntityId,
        range: Range<usize>,
    ) -> Result<Vec<EntityId>, SceneError> {
        let p = self.entities.get_mut(&parent).ok_or(SceneError::UnknownEntity(parent))?;
        let len = p.children.len();
        if range.start > range.end || range.end > len {
            return Err(SceneError::IndexOutOfRange { index: range.end, len });
        }
        let removed: Vec<EntityId> = p.children.drain(range).collect();
        for &child in &removed {
            if let Some(c) = self.entities.get_mut(&child) {
                c.parent = None;
            }
            self.on_child_removed(parent, child);
        }
        Ok(removed)
    }

    /// Remove an entity wherever it is
    ///
    /// Detaches it from its parent if it has one, then destroys it. Unknown ids
    /// are a no-op; the root is only torn down by `clear()`.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        if id == self.root {
            warn!("Ignoring destroy_entity on the root {id}; use Scene::clear");
            return false;
        }
        let Some(entity) = self.entities.get(&id) else {
            return false;
        };
        match entity.parent {
            Some(parent) => self.remove_child(parent, id),
            None => {
                self.destroy(id);
                true
            }
        }
    }

    /// Structural-attach notification for `parent`
    fn on_child_added(&mut self, parent: EntityId, child: EntityId) {
        if self.live.contains(&parent) {
            self.register_subtree(child);
        }
    }

    /// Structural-detach notification for `parent`
    fn on_child_removed(&mut self, parent: EntityId, child: EntityId) {
        trace!("Entity {child} detached from {parent}");
        self.destroy(child);
    }

    /// Add one entity to the live set and every index
    pub(super) fn register(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        if !self.live.insert(id) {
            return;
        }
        self.by_tag.entry(entity.tag().to_string()).or_default().insert(id);
        for bit in entity.flags().single_bits() {
            self.by_flag.entry(bit).or_default().insert(id);
        }
        trace!("Registered entity {id} ({})", entity.tag());
    }

    fn register_subtree(&mut self, id: EntityId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            self.register(next);
            if let Some(entity) = self.entities.get(&next) {
                stack.extend(entity.children.iter().rev().copied());
            }
        }
    }

    fn unregister(&mut self, id: EntityId) {
        if !self.live.remove(&id) {
            return;
        }
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let tag = entity.tag().to_string();
        let flags = entity.flags();
        self.unindex_tag(id, &tag);
        for bit in flags.single_bits() {
            self.unindex_flag_bit(id, bit);
        }
        trace!("Unregistered entity {id} ({tag})");
    }

    /// Cascade teardown of one entity
    ///
    /// Components first (`on_finish`/`on_remove`), then descendants, then the
    /// entity leaves every index and the arena. The caller has already unlinked
    /// it from its parent.
    pub(super) fn destroy(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        for component in entity.components().to_vec() {
            self.remove_component(component);
        }

        let children = self
            .entities
            .get_mut(&id)
            .map(|e| std::mem::take(&mut e.children))
            .unwrap_or_default();
        for child in children {
            if let Some(c) = self.entities.get_mut(&child) {
                c.parent = None;
            }
            self.destroy(child);
        }

        self.unregister(id);
        if let Some(entity) = self.entities.remove(&id) {
            // Components attached by teardown hooks of this very entity
            for component in entity.components().to_vec() {
                self.remove_component(component);
            }
            for child in entity.children {
                if let Some(c) = self.entities.get_mut(&child) {
                    c.parent = None;
                }
                self.destroy(child);
            }
        }
        trace!("Destroyed entity {id}");
    }

    fn is_ancestor_or_self(&self, candidate: EntityId, mut node: EntityId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.entities.get(&node).and_then(|e| e.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Local-to-global transform of an entity's node
    pub fn world_matrix(&self, id: EntityId) -> Option<Mat3> {
        let mut matrix = self.entities.get(&id)?.node().local_matrix();
        let mut current = self.entities.get(&id)?.parent;
        while let Some(parent) = current {
            let entity = self.entities.get(&parent)?;
            matrix = entity.node().local_matrix() * matrix;
            current = entity.parent;
        }
        Some(matrix)
    }

    /// Convert a point in `id`'s local space to global space
    pub fn to_global(&self, id: EntityId, local: Vec2) -> Result<Vec2, SceneError> {
        let matrix = self.world_matrix(id).ok_or(SceneError::UnknownEntity(id))?;
        Ok(transform_point(&matrix, local))
    }

    /// Convert a global point into `id`'s local space
    pub fn to_local(&self, id: EntityId, global: Vec2) -> Result<Vec2, SceneError> {
        let matrix = self.world_matrix(id).ok_or(SceneError::UnknownEntity(id))?;
        let inverse = matrix.try_inverse().ok_or(SceneError::DegenerateTransform(id))?;
        Ok(transform_point(&inverse, global))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reachable(scene: &Scene) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![scene.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(scene.entity(id).unwrap().children().iter().copied());
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn test_detached_subtree_registers_on_attach() {
        let mut scene = Scene::new();
        let root = scene.root();
        let ship = scene.create_entity("ship");
        let turret = scene.create_entity("turret");
        scene.add_child(ship, turret).unwrap();
        assert!(!scene.is_live(turret));

        scene.add_child(root, ship).unwrap();
        assert!(scene.is_live(ship));
        assert!(scene.is_live(turret));
        assert_eq!(scene.find_first_by_tag("turret"), Some(turret));
        assert_eq!(reachable(&scene), scene.live_entities());
    }

    #[test]
    fn test_remove_child_destroys_subtree() {
        let mut scene = Scene::new();
        let root = scene.root();
        let ship = scene.create_entity("ship");
        let turret = scene.create_entity("turret");
        scene.add_child(root, ship).unwrap();
        scene.add_child(ship, turret).unwrap();

        assert!(scene.remove_child(root, ship));
        assert!(scene.entity(ship).is_none());
        assert!(scene.entity(turret).is_none());
        assert!(scene.find_first_by_tag("turret").is_none());
        assert_eq!(reachable(&scene), scene.live_entities());

        // second removal is a no-op
        assert!(!scene.remove_child(root, ship));
        assert!(!scene.destroy_entity(ship));
    }

    #[test]
    fn test_insert_and_range_removal_keep_order() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        let c = scene.create_entity("c");
        scene.add_child(root, a).unwrap();
        scene.add_child(root, c).unwrap();
        scene.insert_child_at(root, b, 1).unwrap();
        assert_eq!(scene.entity(root).unwrap().children(), &[a, b, c]);

        let removed = scene.remove_children(root, 0..2).unwrap();
        assert_eq!(removed, vec![a, b]);
        assert_eq!(scene.entity(root).unwrap().children(), &[c]);
        assert_eq!(reachable(&scene), scene.live_entities());

        assert_eq!(
            scene.remove_children(root, 0..5),
            Err(SceneError::IndexOutOfRange { index: 5, len: 1 })
        );
    }

    #[test]
    fn test_structural_errors() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        scene.add_child(root, a).unwrap();
        scene.add_child(a, b).unwrap();

        assert_eq!(
            scene.add_child(root, b),
            Err(SceneError::AlreadyParented { child: b, parent: a })
        );
        assert_eq!(scene.add_child(a, root), Err(SceneError::RootCannotBeChild));

        let loose = scene.create_entity("loose");
        let leaf = scene.create_entity("leaf");
        scene.add_child(loose, leaf).unwrap();
        assert_eq!(
            scene.add_child(leaf, loose),
            Err(SceneError::CyclicParenting { parent: leaf, child: loose })
        );
        assert_eq!(
            scene.add_child(loose, loose),
            Err(SceneError::CyclicParenting { parent: loose, child: loose })
        );
        assert_eq!(
            scene.insert_child_at(root, loose, 9),
            Err(SceneError::IndexOutOfRange { index: 9, len: 1 })
        );
    }

    #[test]
    fn test_destroy_detached_entity() {
        let mut scene = Scene::new();
        let loose = scene.create_entity("loose");
        assert!(scene.destroy_entity(loose));
        assert!(scene.entity(loose).is_none());
        assert!(!scene.destroy_entity(scene.root()));
    }

    #[test]
    fn test_coordinate_conversion_through_parents() {
        let mut scene = Scene::new();
        let root = scene.root();
        let layer = scene.create_entity("layer");
        scene.add_child(root, layer).unwrap();
        {
            let node = scene.entity_mut(layer).unwrap().node_mut();
            node.position = Vec2::new(100.0, 50.0);
            node.scale = Vec2::new(2.0, 2.0);
        }

        let global = scene.to_global(layer, Vec2::new(10.0, 10.0)).unwrap();
        assert_relative_eq!(global, Vec2::new(120.0, 70.0));
        let local = scene.to_local(layer, global).unwrap();
        assert_relative_eq!(local, Vec2::new(10.0, 10.0), epsilon = 1e-4);

        scene.entity_mut(layer).unwrap().node_mut().scale = Vec2::zeros();
        assert_eq!(scene.to_local(layer, global), Err(SceneError::DegenerateTransform(layer)));
    }
}

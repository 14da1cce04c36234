//! Render-tree node geometry
//!
//! Each entity wraps exactly one node. The node knows its local transform and
//! its measured content size; the hierarchy itself lives on the entities and is
//! mutated through the scene.

use crate::foundation::math::{transform_point, Bounds, Mat3, Vec2};

/// Geometry of one render-tree node
#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    /// Where the pivot lands in the parent's space
    pub position: Vec2,

    /// Per-axis scale
    pub scale: Vec2,

    /// Local point (unscaled) that rotation and scale are applied around
    pub pivot: Vec2,

    /// Rotation in radians
    pub rotation: f32,

    /// Measured content size (text extent, sprite texture size, ...)
    pub size: Vec2,
}

impl Default for RenderNode {
    fn default() -> Self {
        Self {
            position: Vec2::zeros(),
            scale: Vec2::new(1.0, 1.0),
            pivot: Vec2::zeros(),
            rotation: 0.0,
            size: Vec2::zeros(),
        }
    }
}

impl RenderNode {
    /// Node with the given content size
    pub fn with_size(width: f32, height: f32) -> Self {
        Self {
            size: Vec2::new(width, height),
            ..Self::default()
        }
    }

    /// Local-to-parent transform: translate, rotate, scale, then offset by the pivot
    pub fn local_matrix(&self) -> Mat3 {
        Mat3::new_translation(&self.position)
            * Mat3::new_rotation(self.rotation)
            * Mat3::new_nonuniform_scaling(&self.scale)
            * Mat3::new_translation(&-self.pivot)
    }

    /// Displayed width (content width times scale)
    pub fn width(&self) -> f32 {
        self.size.x * self.scale.x.abs()
    }

    /// Displayed height (content height times scale)
    pub fn height(&self) -> f32 {
        self.size.y * self.scale.y.abs()
    }

    /// Bounds of the content rectangle in the parent's space
    pub fn bounds(&self) -> Bounds {
        let m = self.local_matrix();
        let corners = [
            Vec2::zeros(),
            Vec2::new(self.size.x, 0.0),
            Vec2::new(0.0, self.size.y),
            self.size,
        ];
        Bounds::from_points(corners.iter().map(|c| transform_point(&m, *c)))
            .unwrap_or_else(|| Bounds::new(self.position, self.position))
    }

    /// Set the pivot from a fraction of the measured size
    pub fn set_anchor(&mut self, anchor: Vec2) {
        self.pivot = anchor.component_mul(&self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_with_scale_and_pivot() {
        let mut node = RenderNode::with_size(10.0, 4.0);
        node.scale = Vec2::new(2.0, 2.0);
        node.set_anchor(Vec2::new(0.5, 0.5));
        node.position = Vec2::new(100.0, 50.0);

        let bounds = node.bounds();
        assert_relative_eq!(bounds.min, Vec2::new(90.0, 46.0));
        assert_relative_eq!(bounds.max, Vec2::new(110.0, 54.0));
        assert_relative_eq!(node.width(), 20.0);
        assert_relative_eq!(node.height(), 8.0);
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let node = RenderNode {
            rotation: std::f32::consts::FRAC_PI_2,
            ..RenderNode::default()
        };
        let p = transform_point(&node.local_matrix(), Vec2::new(1.0, 0.0));
        assert_relative_eq!(p, Vec2::new(0.0, 1.0), epsilon = 1e-6);
    }
}

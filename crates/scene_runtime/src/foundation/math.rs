//! Math utilities and types
//!
//! 2D types for render-tree geometry. Node transforms are 3x3 homogeneous
//! matrices so parent chains compose by plain multiplication.

pub use nalgebra::{Matrix3, Vector2};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f32>;

/// 3x3 homogeneous matrix type
pub type Mat3 = Matrix3<f32>;

/// Apply a homogeneous transform to a position
pub fn transform_point(matrix: &Mat3, point: Vec2) -> Vec2 {
    matrix.transform_point(&Point2::from(point)).coords
}

/// Axis-aligned bounding box in 2D
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Bounds {
    /// Create bounds from min and max corners
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Smallest bounds enclosing all `points`; `None` for an empty iterator
    pub fn from_points<I: IntoIterator<Item = Vec2>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.inf(&p),
            max: acc.max.sup(&p),
        }))
    }

    /// Width along X
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Height along Y
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Center point
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Check if these bounds contain a point (edges inclusive)
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Check if these bounds overlap another box
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

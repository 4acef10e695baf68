//! Math utilities and types
//!
//! Provides fundamental math types for scene-graph conversion, plus the
//! bounding volumes used to position level-of-detail nodes.

pub use nalgebra::{Matrix3, Matrix4, Point3, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Double-precision 3D vector type
pub type DVec3 = Vector3<f64>;

/// Double-precision 4x4 matrix type
pub type DMat4 = Matrix4<f64>;

/// Re-emit a row-convention (row-vector) matrix in column convention.
///
/// Source transforms store their matrices for row-vector multiplication;
/// the produced graph multiplies column vectors, so the matrix is
/// transposed on the way through.
pub fn swap_matrix_convention(m: &DMat4) -> DMat4 {
    m.transpose()
}

/// Axis-aligned bounding box over single-precision points
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl BoundingBox {
    /// Create an empty (invalid) bounding box that any point expands
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    /// Create a bounding box from explicit corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Whether at least one point has been added
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Grow the box to contain a point
    pub fn expand_by(&mut self, point: Vec3) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    /// Grow the box to contain another box
    pub fn expand_by_box(&mut self, other: &BoundingBox) {
        if other.is_valid() {
            self.expand_by(other.min);
            self.expand_by(other.max);
        }
    }

    /// Get the center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the sphere circumscribing the box
    pub fn radius(&self) -> f32 {
        (self.max - self.min).norm() * 0.5
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Double-precision bounding sphere, matching the precision the produced
/// graph uses for level-of-detail bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Center of the sphere
    pub center: DVec3,
    /// Radius of the sphere; negative when the sphere is empty
    pub radius: f64,
}

impl BoundingSphere {
    /// Create an empty (invalid) sphere
    pub fn empty() -> Self {
        Self {
            center: DVec3::zeros(),
            radius: -1.0,
        }
    }

    /// Create a sphere from center and radius
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Whether the sphere encloses anything
    pub fn is_valid(&self) -> bool {
        self.radius >= 0.0
    }

    /// Sphere circumscribing a bounding box
    pub fn from_box(bb: &BoundingBox) -> Self {
        if !bb.is_valid() {
            return Self::empty();
        }
        Self {
            center: bb.center().cast::<f64>(),
            radius: f64::from(bb.radius()),
        }
    }

    /// Grow this sphere to enclose another sphere
    pub fn expand_by(&mut self, other: &BoundingSphere) {
        if !other.is_valid() {
            return;
        }
        if !self.is_valid() {
            *self = *other;
            return;
        }

        let between = other.center - self.center;
        let distance = between.norm();

        // One sphere already contains the other
        if distance + other.radius <= self.radius {
            return;
        }
        if distance + self.radius <= other.radius {
            *self = *other;
            return;
        }

        let new_radius = (distance + self.radius + other.radius) * 0.5;
        let ratio = (new_radius - self.radius) / distance;
        self.center += between * ratio;
        self.radius = new_radius;
    }

    /// Transform the sphere by an affine matrix, conservatively scaling the
    /// radius by the largest axis scale
    pub fn transformed(&self, matrix: &DMat4) -> BoundingSphere {
        if !self.is_valid() {
            return *self;
        }

        let center = matrix
            .transform_point(&Point3::new(self.center.x, self.center.y, self.center.z))
            .coords;

        let scale_x = DVec3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]).norm();
        let scale_y = DVec3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]).norm();
        let scale_z = DVec3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]).norm();
        let max_scale = scale_x.max(scale_y).max(scale_z);

        BoundingSphere {
            center,
            radius: self.radius * max_scale,
        }
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::empty()
    }
}

//! Math utilities and types
//!
//! Provides the transform and bounding-volume types used by the spatial
//! hierarchy.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Builder pattern: Set scale (uniform)
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Convert to a transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Translation part of an affine matrix
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Oriented bounding box
///
/// Bounds are half-open: a point exactly on a face is outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    /// Center of the box
    pub center: Vec3,
    /// Half size along each of the box axes
    pub half_extents: Vec3,
    /// Orthonormal box axes, one per column
    pub axes: Mat3,
}

impl Default for Obb {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Vec3::zeros())
    }
}

impl Obb {
    /// Axis-aligned box from center and half extents
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
            axes: Mat3::identity(),
        }
    }

    /// Axis-aligned box from its min and max corners
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self::new((min + max) * 0.5, (max - min) * 0.5)
    }

    /// Box of zero volume (contains nothing)
    pub fn is_empty(&self) -> bool {
        self.half_extents.iter().any(|e| *e <= 0.0)
    }

    /// Transform the box by an affine matrix
    ///
    /// Scale is folded into the half extents, so the result keeps
    /// orthonormal axes.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let linear: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let center = matrix.transform_point(&Point3::from(self.center)).coords;
        let basis = linear * self.axes;

        let mut axes = self.axes;
        let mut half_extents = self.half_extents;
        for i in 0..3 {
            let column = basis.column(i).into_owned();
            let length = column.norm();
            half_extents[i] *= length;
            if length > f32::EPSILON {
                axes.set_column(i, &(column / length));
            }
        }

        Self {
            center,
            half_extents,
            axes,
        }
    }

    /// Check if the point lies strictly inside the box
    pub fn contains_point(&self, point: Vec3) -> bool {
        let offset = point - self.center;
        (0..3).all(|i| offset.dot(&self.axes.column(i)).abs() < self.half_extents[i])
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}

/// 4x4 homogeneous transformation matrices
use std::ops::Mul;

use nalgebra::{Matrix3, Matrix4, Rotation3, Unit, Vector3};

/// A 4x4 float transform.
///
/// Composition follows the usual column-vector convention: `a * b` applies
/// `b` first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(Matrix4<f32>);

impl Transform {
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    pub fn from_matrix(matrix: Matrix4<f32>) -> Self {
        Self(matrix)
    }

    /// Create a translation matrix
    pub fn translation(offset: &Vector3<f32>) -> Self {
        Self(Matrix4::new_translation(offset))
    }

    /// Rotation of `angle_deg` degrees about `axis` (right-handed).
    /// A zero axis yields the identity.
    pub fn rotation(axis: &Vector3<f32>, angle_deg: f32) -> Self {
        match Unit::try_new(*axis, f32::EPSILON) {
            Some(axis) => Self(Rotation3::from_axis_angle(&axis, angle_deg.to_radians()).to_homogeneous()),
            None => Self::identity(),
        }
    }

    /// Rotation whose upper-left block has the given columns
    pub fn from_basis(x: &Vector3<f32>, y: &Vector3<f32>, z: &Vector3<f32>) -> Self {
        Self(Matrix3::from_columns(&[*x, *y, *z]).to_homogeneous())
    }

    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.0
    }

    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// General inverse; `None` for singular matrices
    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Closed-form inverse of a rotation-plus-translation matrix.
    ///
    /// Only valid when the upper-left block is orthonormal and the bottom
    /// row is `[0 0 0 1]`.
    pub fn rigid_inverse(&self) -> Self {
        let r_t = self.rotation_block().transpose();
        let t = -(r_t * self.translation_part());
        let mut m = r_t.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
        Self(m)
    }

    pub fn rotation_block(&self) -> Matrix3<f32> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation_part(&self) -> Vector3<f32> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Elements in column-major order, as OpenGL-style APIs expect them
    pub fn to_column_major(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.0.as_slice());
        out
    }

    /// Columns of the rotation block are unit length and pairwise orthogonal
    pub fn is_orthonormal(&self, tolerance: f32) -> bool {
        let r = self.rotation_block();
        (r.transpose() * r - Matrix3::identity()).abs().max() <= tolerance
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform(self.0 * rhs.0)
    }
}

impl From<Matrix4<f32>> for Transform {
    fn from(m: Matrix4<f32>) -> Self {
        Self(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_identity_rotation() {
        let matrix = Transform::rotation(&Vector3::y(), 0.0);
        assert_relative_eq!(*matrix.matrix(), Matrix4::identity());
        assert_eq!(Transform::rotation(&Vector3::zeros(), 30.0), Transform::identity());
    }

    #[test]
    fn test_rotation_is_in_degrees() {
        let r = Transform::rotation(&Vector3::z(), 90.0);
        let p = r.matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_rigid_inverse_matches_general_inverse() {
        let m = Transform::rotation(&Vector3::new(1.0, 2.0, 3.0), 37.0)
            * Transform::translation(&Vector3::new(4.0, -5.0, 6.0));

        let general = m.inverse().expect("invertible");
        assert_relative_eq!(*m.rigid_inverse().matrix(), *general.matrix(), epsilon = 1e-5);
        assert_relative_eq!(*(m * m.rigid_inverse()).matrix(), Matrix4::identity(), epsilon = 1e-5);
    }

    #[test]
    fn test_transpose_and_column_major() {
        let t = Transform::translation(&Vector3::new(1.0, 2.0, 3.0));
        let cols = t.to_column_major();
        assert_eq!(&cols[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(t.transpose().matrix()[(3, 0)], 1.0);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(Transform::from_matrix(Matrix4::zeros()).inverse().is_none());
    }
}

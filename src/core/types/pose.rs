//! Rigid-body pose in 3D space.

use nalgebra::{Matrix3, Matrix4, Vector3};

/// A 4×4 rigid transform (rotation + translation).
///
/// The top-left 3×3 block is expected to be orthonormal with determinant 1.
/// That invariant is established at construction and never re-enforced by
/// renormalization afterwards, so small numerical drift can accumulate over
/// long pose chains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose3D {
    matrix: Matrix4<f32>,
}

impl Pose3D {
    /// Identity pose at the origin.
    #[inline]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap an existing 4×4 transform.
    ///
    /// The bottom row must be `[0, 0, 0, 1]`.
    pub fn from_matrix(matrix: Matrix4<f32>) -> Self {
        assert!(
            matrix.m41 == 0.0 && matrix.m42 == 0.0 && matrix.m43 == 0.0 && matrix.m44 == 1.0,
            "pose matrix must have an affine bottom row"
        );
        Self { matrix }
    }

    /// Assemble a pose from a rotation block and a translation vector.
    pub fn from_parts(rotation: Matrix3<f32>, translation: Vector3<f32>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self { matrix }
    }

    /// The underlying 4×4 matrix.
    #[inline]
    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.matrix
    }

    /// The 3×3 rotation block.
    #[inline]
    pub fn rotation(&self) -> Matrix3<f32> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation column.
    #[inline]
    pub fn translation(&self) -> Vector3<f32> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Compose two poses: `self · other` (apply `other` first).
    #[inline]
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Inverse of this pose.
    ///
    /// Uses the general matrix inverse; falls back to the closed-form rigid
    /// inverse only if the general inversion fails numerically.
    pub fn inverse(&self) -> Pose3D {
        match self.matrix.try_inverse() {
            Some(inv) => Pose3D { matrix: inv },
            None => {
                let rt = self.rotation().transpose();
                Pose3D::from_parts(rt, -(rt * self.translation()))
            }
        }
    }

    /// Transform a point: `R·p + t`.
    #[inline]
    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation() * point + self.translation()
    }

    /// Transform a normal by the inverse-transpose of the rotation block.
    ///
    /// For an orthonormal rotation this equals the rotation itself, but the
    /// inverse-transpose is computed explicitly so drifted rotation blocks
    /// are handled the same way as clean ones.
    #[inline]
    pub fn transform_normal(&self, normal: &Vector3<f32>) -> Vector3<f32> {
        let rot = self.rotation();
        let inv = rot.try_inverse().unwrap_or_else(|| rot.transpose());
        inv.transpose() * normal
    }

    /// Euclidean distance between the translations of two poses.
    pub fn translation_distance(&self, other: &Pose3D) -> f32 {
        (self.translation() - other.translation()).norm()
    }

    /// Rotation angle of `self⁻¹ · other` (relative rotation magnitude).
    pub fn rotation_distance(&self, other: &Pose3D) -> f32 {
        let rel = self.inverse().compose(other).rotation();
        let cos = ((rel.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
        cos.acos()
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::rotation_from_angles;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn sample_pose() -> Pose3D {
        Pose3D::from_parts(
            rotation_from_angles(0.2, -0.4, 0.1),
            Vector3::new(1.0, -2.0, 0.5),
        )
    }

    #[test]
    fn test_identity_transforms_nothing() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        let pose = Pose3D::identity();
        assert_relative_eq!(pose.transform_point(&p), p);
        assert_relative_eq!(pose.transform_normal(&p), p);
    }

    #[test]
    fn test_compose_with_identity() {
        let pose = sample_pose();
        let composed = pose.compose(&Pose3D::identity());
        assert_relative_eq!(composed.matrix(), pose.matrix(), epsilon = 1e-6);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let pose = sample_pose();
        let roundtrip = pose.compose(&pose.inverse());
        assert_relative_eq!(roundtrip.matrix(), Pose3D::identity().matrix(), epsilon = 1e-5);
    }

    #[test]
    fn test_transform_point_roundtrip() {
        let pose = sample_pose();
        let p = Vector3::new(0.3, 0.8, 2.0);
        let back = pose.inverse().transform_point(&pose.transform_point(&p));
        assert_relative_eq!(back, p, epsilon = 1e-5);
    }

    #[test]
    fn test_transform_normal_roundtrip() {
        let pose = sample_pose();
        let n = Vector3::new(0.0, 0.0, -1.0);
        let back = pose.inverse().transform_normal(&pose.transform_normal(&n));
        assert_relative_eq!(back, n, epsilon = 1e-5);
    }

    #[test]
    fn test_transform_normal_matches_rotation_for_orthonormal() {
        let pose = sample_pose();
        let n = Vector3::new(0.6, -0.8, 0.0);
        assert_relative_eq!(
            pose.transform_normal(&n),
            pose.rotation() * n,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_rotation_distance() {
        let a = Pose3D::identity();
        let b = Pose3D::from_parts(
            rotation_from_angles(0.0, FRAC_PI_2, 0.0),
            Vector3::zeros(),
        );
        assert_relative_eq!(a.rotation_distance(&b), FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_translation_distance() {
        let a = Pose3D::identity();
        let b = Pose3D::from_parts(Matrix3::identity(), Vector3::new(3.0, 0.0, 4.0));
        assert_relative_eq!(a.translation_distance(&b), 5.0, epsilon = 1e-6);
    }

    #[test]
    #[should_panic]
    fn test_bad_bottom_row_panics() {
        let mut m = Matrix4::identity();
        m.m44 = 2.0;
        let _ = Pose3D::from_matrix(m);
    }
}

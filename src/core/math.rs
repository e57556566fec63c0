//! Mathematical primitives for 3D rigid-body geometry.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Build a rotation matrix from three solved Euler-like angles.
///
/// Composed as Rx(alpha) · Ry(beta) · Rz(gamma), i.e. three sequential
/// exact-angle axis rotations. The incremental ICP solve treats the angles
/// as small, but the composition here is exact, not a first-order skew
/// approximation.
pub fn rotation_from_angles(alpha: f32, beta: f32, gamma: f32) -> Matrix3<f32> {
    let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), alpha);
    let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), beta);
    let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), gamma);
    (rx * ry * rz).into_inner()
}

/// Check that every component of a vector is finite.
#[inline]
pub fn is_finite_vec(v: &Vector3<f32>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

/// Angle in radians between two vectors.
///
/// Returns 0 for degenerate (zero-length) inputs.
pub fn angle_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let na = a.norm();
    let nb = b.norm();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_rotation_identity_at_zero_angles() {
        let r = rotation_from_angles(0.0, 0.0, 0.0);
        assert_relative_eq!(r, Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_single_axis() {
        let r = rotation_from_angles(0.0, 0.0, FRAC_PI_2);
        let v = r * Vector3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        let r = rotation_from_angles(0.3, -0.2, 0.7);
        let should_be_identity = r * r.transpose();
        assert_relative_eq!(should_be_identity, Matrix3::identity(), epsilon = 1e-5);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotation_composition_order() {
        // Rx * Ry * Rz: gamma is applied first
        let r = rotation_from_angles(FRAC_PI_2, 0.0, FRAC_PI_2);
        let v = r * Vector3::new(1.0, 0.0, 0.0);
        // Rz rotates x->y, then Rx rotates y->z
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(v.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_is_finite_vec() {
        assert!(is_finite_vec(&Vector3::new(1.0, 2.0, 3.0)));
        assert!(!is_finite_vec(&Vector3::new(f32::NAN, 0.0, 0.0)));
        assert!(!is_finite_vec(&Vector3::new(0.0, f32::NEG_INFINITY, 0.0)));
    }

    #[test]
    fn test_angle_between() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 2.0, 0.0);
        assert_relative_eq!(angle_between(&x, &y), FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(angle_between(&x, &x), 0.0, epsilon = 1e-4);
        assert_relative_eq!(angle_between(&x, &(-x)), PI, epsilon = 1e-4);
    }

    #[test]
    fn test_angle_between_degenerate() {
        let zero = Vector3::zeros();
        let x = Vector3::new(1.0, 0.0, 0.0);
        assert_eq!(angle_between(&zero, &x), 0.0);
    }
}

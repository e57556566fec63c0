//! Pinhole camera intrinsics.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Pinhole projection parameters, constant for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length in x (pixels).
    pub fx: f32,
    /// Focal length in y (pixels).
    pub fy: f32,
    /// Principal point x (pixels).
    pub cx: f32,
    /// Principal point y (pixels).
    pub cy: f32,
}

impl Intrinsics {
    /// Create intrinsics from focal lengths and principal point.
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Extract intrinsics from a 3×3 projection matrix.
    pub fn from_matrix(k: &Matrix3<f32>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    /// The 3×3 projection matrix.
    pub fn matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Back-project pixel `(x, y)` with depth `d` to a camera-space point.
    #[inline]
    pub fn backproject(&self, x: f32, y: f32, depth: f32) -> Vector3<f32> {
        Vector3::new(
            (x - self.cx) / self.fx * depth,
            (y - self.cy) / self.fy * depth,
            depth,
        )
    }

    /// Project a camera-space point to continuous pixel coordinates.
    ///
    /// Returns `None` for points at or behind the camera plane.
    #[inline]
    pub fn project(&self, point: &Vector3<f32>) -> Option<(f32, f32)> {
        if point.z <= 0.0 {
            return None;
        }
        Some((
            point.x / point.z * self.fx + self.cx,
            point.y / point.z * self.fy + self.cy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Intrinsics {
        Intrinsics::new(525.0, 525.0, 319.5, 239.5)
    }

    #[test]
    fn test_backproject_project_roundtrip() {
        let k = sample();
        let p = k.backproject(100.0, 200.0, 1.5);
        let (x, y) = k.project(&p).unwrap();
        assert_relative_eq!(x, 100.0, epsilon = 1e-4);
        assert_relative_eq!(y, 200.0, epsilon = 1e-4);
    }

    #[test]
    fn test_principal_point_backprojects_on_axis() {
        let k = sample();
        let p = k.backproject(k.cx, k.cy, 2.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.z, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_project_behind_camera() {
        let k = sample();
        assert!(k.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
        assert!(k.project(&Vector3::new(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_matrix_roundtrip() {
        let k = sample();
        let restored = Intrinsics::from_matrix(&k.matrix());
        assert_eq!(k, restored);
    }
}

//! Synthetic depth sensor over an analytic scene.
//!
//! Renders depth (and color) frames of planes and spheres from a scripted
//! camera trajectory. Stands in for a real range sensor in the demo driver
//! and in tests, implementing the same [`DepthSensor`] contract.

use nalgebra::Vector3;

use super::DepthSensor;
use crate::core::types::{ColorImage, DepthImage, Intrinsics, Pose3D, DEPTH_SENTINEL};

/// An analytic surface the sensor can observe.
#[derive(Debug, Clone)]
pub enum Surface {
    /// Infinite plane through `point` with unit `normal`.
    Plane {
        point: Vector3<f32>,
        normal: Vector3<f32>,
        color: [u8; 3],
    },
    /// Sphere centered at `center`.
    Sphere {
        center: Vector3<f32>,
        radius: f32,
        color: [u8; 3],
    },
}

impl Surface {
    pub fn plane(point: Vector3<f32>, normal: Vector3<f32>, color: [u8; 3]) -> Self {
        Self::Plane {
            point,
            normal: normal.normalize(),
            color,
        }
    }

    pub fn sphere(center: Vector3<f32>, radius: f32, color: [u8; 3]) -> Self {
        Self::Sphere {
            center,
            radius,
            color,
        }
    }

    /// Smallest positive ray parameter hitting the surface, if any.
    ///
    /// `dir` need not be normalized; the returned `t` is in units of `dir`.
    fn intersect(&self, origin: &Vector3<f32>, dir: &Vector3<f32>) -> Option<f32> {
        match self {
            Surface::Plane { point, normal, .. } => {
                let denom = normal.dot(dir);
                if denom.abs() < 1e-9 {
                    return None;
                }
                let t = normal.dot(&(point - origin)) / denom;
                (t > 1e-4).then_some(t)
            }
            Surface::Sphere { center, radius, .. } => {
                let oc = origin - center;
                let a = dir.dot(dir);
                let b = 2.0 * dir.dot(&oc);
                let c = oc.dot(&oc) - radius * radius;
                let disc = b * b - 4.0 * a * c;
                if disc < 0.0 {
                    return None;
                }
                let sqrt_disc = disc.sqrt();
                let t0 = (-b - sqrt_disc) / (2.0 * a);
                let t1 = (-b + sqrt_disc) / (2.0 * a);
                if t0 > 1e-4 {
                    Some(t0)
                } else if t1 > 1e-4 {
                    Some(t1)
                } else {
                    None
                }
            }
        }
    }

    fn color(&self) -> [u8; 3] {
        match self {
            Surface::Plane { color, .. } | Surface::Sphere { color, .. } => *color,
        }
    }
}

/// A collection of analytic surfaces.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    surfaces: Vec<Surface>,
}

impl Scene {
    pub fn new(surfaces: Vec<Surface>) -> Self {
        Self { surfaces }
    }

    /// Closest hit along a ray, as (ray parameter, surface color).
    fn cast(&self, origin: &Vector3<f32>, dir: &Vector3<f32>) -> Option<(f32, [u8; 3])> {
        let mut best: Option<(f32, [u8; 3])> = None;
        for surface in &self.surfaces {
            if let Some(t) = surface.intersect(origin, dir) {
                if best.map_or(true, |(bt, _)| t < bt) {
                    best = Some((t, surface.color()));
                }
            }
        }
        best
    }
}

/// Depth + color sensor rendering an analytic scene along a fixed
/// camera-to-world trajectory.
pub struct SyntheticSensor {
    intrinsics: Intrinsics,
    width: usize,
    height: usize,
    scene: Scene,
    trajectory: Vec<Pose3D>,
    max_depth: f32,
    frame: Option<usize>,
    depth: DepthImage,
    color: ColorImage,
}

impl SyntheticSensor {
    /// Create a sensor; call [`DepthSensor::advance_frame`] to load the
    /// first frame.
    pub fn new(
        intrinsics: Intrinsics,
        width: usize,
        height: usize,
        scene: Scene,
        trajectory: Vec<Pose3D>,
    ) -> Self {
        Self {
            intrinsics,
            width,
            height,
            scene,
            trajectory,
            max_depth: 10.0,
            frame: None,
            depth: DepthImage::filled_invalid(width, height),
            color: ColorImage::black(width, height),
        }
    }

    /// Limit the rendered depth range; hits farther away become invalid
    /// pixels.
    pub fn with_max_depth(mut self, max_depth: f32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Index of the currently loaded frame.
    pub fn frame_index(&self) -> Option<usize> {
        self.frame
    }

    fn render(&mut self, pose_idx: usize) {
        let pose = self.trajectory[pose_idx];
        let rotation = pose.rotation();
        let origin = pose.translation();

        for y in 0..self.height {
            for x in 0..self.width {
                // Camera-space ray with unit z: the hit parameter t is then
                // exactly the camera-space depth.
                let dir_cam = Vector3::new(
                    (x as f32 - self.intrinsics.cx) / self.intrinsics.fx,
                    (y as f32 - self.intrinsics.cy) / self.intrinsics.fy,
                    1.0,
                );
                let dir_world = rotation * dir_cam;
                match self.scene.cast(&origin, &dir_world) {
                    Some((t, rgb)) if t <= self.max_depth => {
                        self.depth.set(x, y, t);
                        self.color.set(x, y, rgb);
                    }
                    _ => {
                        self.depth.set(x, y, DEPTH_SENTINEL);
                        self.color.set(x, y, [0, 0, 0]);
                    }
                }
            }
        }
    }
}

impl DepthSensor for SyntheticSensor {
    fn advance_frame(&mut self) -> bool {
        let next = self.frame.map_or(0, |i| i + 1);
        if next >= self.trajectory.len() {
            return false;
        }
        self.render(next);
        self.frame = Some(next);
        true
    }

    fn depth(&self) -> &DepthImage {
        &self.depth
    }

    fn color(&self) -> Option<&ColorImage> {
        Some(&self.color)
    }

    fn intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn ground_truth_pose(&self) -> Option<Pose3D> {
        self.frame.map(|i| self.trajectory[i])
    }
}

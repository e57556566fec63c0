//! Raycast surface prediction from a TSDF volume.

use serde::{Deserialize, Serialize};

use nalgebra::Vector3;

use crate::core::types::{ColorImage, GeometryFrame, Intrinsics, Pose3D};

use super::tsdf::TsdfVolume;

/// Tuning parameters for raycasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// March step length as a fraction of the voxel edge. Below 1.0 the
    /// march cannot skip over a voxel along an axis-aligned ray.
    pub step_scale: f32,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self { step_scale: 0.5 }
    }
}

/// Renders the fused model into a synthetic view.
///
/// One ray per pixel is marched through the volume looking for a
/// positive-to-negative zero crossing of the signed distance field among
/// observed voxels. Output points are in world space, ready to serve as a
/// registration target without further transformation.
pub struct SurfacePredictor {
    intrinsics: Intrinsics,
    config: PredictorConfig,
}

impl SurfacePredictor {
    pub fn new(intrinsics: Intrinsics, config: PredictorConfig) -> Self {
        Self { intrinsics, config }
    }

    /// Predict the surface visible from `camera_pose` (camera to world) as
    /// a world-space geometry frame. Pixels whose ray misses the volume,
    /// exits it, or crosses only unobserved space stay invalid.
    pub fn predict(
        &self,
        volume: &TsdfVolume,
        width: usize,
        height: usize,
        camera_pose: &Pose3D,
    ) -> GeometryFrame {
        let mut frame = GeometryFrame::invalid(width, height);
        let origin = camera_pose.translation();

        for py in 0..height {
            for px in 0..width {
                let idx = py * width + px;
                let direction = self.pixel_ray(px, py, camera_pose);
                let Some(hit) = march(volume, &origin, &direction, self.config.step_scale) else {
                    continue;
                };
                frame.points[idx] = origin + direction * hit.t;
                frame.points_valid[idx] = true;

                let (vx, vy, vz) = hit.voxel;
                if let Some(gradient) = volume.gradient(vx, vy, vz) {
                    let norm = gradient.norm();
                    if norm > f32::EPSILON && gradient.iter().all(|c| c.is_finite()) {
                        frame.normals[idx] = gradient / norm;
                        frame.normals_valid[idx] = true;
                    }
                }
            }
        }
        frame
    }

    /// Predict the color view from `camera_pose`. Pixels without a surface
    /// hit (or on a colorless volume) stay black.
    pub fn predict_color(
        &self,
        volume: &TsdfVolume,
        width: usize,
        height: usize,
        camera_pose: &Pose3D,
    ) -> ColorImage {
        let mut image = ColorImage::black(width, height);
        let origin = camera_pose.translation();

        for py in 0..height {
            for px in 0..width {
                let direction = self.pixel_ray(px, py, camera_pose);
                let Some(hit) = march(volume, &origin, &direction, self.config.step_scale) else {
                    continue;
                };
                let (vx, vy, vz) = hit.voxel;
                if let Some(rgb) = volume.color(vx, vy, vz) {
                    image.set(
                        px,
                        py,
                        [
                            rgb[0].clamp(0.0, 255.0) as u8,
                            rgb[1].clamp(0.0, 255.0) as u8,
                            rgb[2].clamp(0.0, 255.0) as u8,
                        ],
                    );
                }
            }
        }
        image
    }

    /// Unit world-space ray direction through a pixel center.
    fn pixel_ray(&self, px: usize, py: usize, camera_pose: &Pose3D) -> Vector3<f32> {
        let in_camera = self.intrinsics.backproject(px as f32, py as f32, 1.0);
        let rotated = camera_pose.rotation() * in_camera;
        rotated.normalize()
    }
}

struct RayHit {
    /// Distance along the (unit) ray to the interpolated zero crossing.
    t: f32,
    /// Voxel containing the crossing, for gradient and color lookup.
    voxel: (usize, usize, usize),
}

/// March a ray through the volume and locate the first positive-to-negative
/// zero crossing of the distance field.
///
/// The ray is clipped to the volume's bounding box first, so the march is
/// bounded by the box chord length. Crossing detection needs two
/// consecutive observed samples; a gap of unobserved voxels resets the
/// bracket so a crossing is never interpolated across unseen space.
fn march(
    volume: &TsdfVolume,
    origin: &Vector3<f32>,
    direction: &Vector3<f32>,
    step_scale: f32,
) -> Option<RayHit> {
    let (t_enter, t_exit) = clip_to_box(
        origin,
        direction,
        &volume.origin(),
        &volume.origin().add_scalar(volume.extent()),
    )?;
    let step = volume.voxel_size() * step_scale;
    let mut t = t_enter.max(0.0) + step * 0.5;
    let mut previous: Option<(f32, f32)> = None;

    while t <= t_exit {
        let sample = origin + direction * t;
        match volume.sample_distance(&sample) {
            Some(d) => {
                if let Some((t_prev, d_prev)) = previous {
                    if d_prev > 0.0 && d <= 0.0 {
                        let t_hit = t_prev + (t - t_prev) * d_prev / (d_prev - d);
                        let hit_point = origin + direction * t_hit;
                        let voxel = volume.world_to_voxel(&hit_point)?;
                        return Some(RayHit { t: t_hit, voxel });
                    }
                }
                previous = Some((t, d));
            }
            None => previous = None,
        }
        t += step;
    }
    None
}

/// Slab intersection of a ray with an axis-aligned box.
///
/// Returns the entry and exit parameters, `None` on a miss.
fn clip_to_box(
    origin: &Vector3<f32>,
    direction: &Vector3<f32>,
    box_min: &Vector3<f32>,
    box_max: &Vector3<f32>,
) -> Option<(f32, f32)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;

    for axis in 0..3 {
        if direction[axis].abs() <= f32::EPSILON {
            if origin[axis] < box_min[axis] || origin[axis] > box_max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / direction[axis];
        let t0 = (box_min[axis] - origin[axis]) * inv;
        let t1 = (box_max[axis] - origin[axis]) * inv;
        let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        t_enter = t_enter.max(near);
        t_exit = t_exit.min(far);
        if t_enter > t_exit {
            return None;
        }
    }
    if t_exit < 0.0 {
        return None;
    }
    Some((t_enter, t_exit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::algorithms::fusion::{ReconstructorConfig, SurfaceReconstructor};
    use crate::core::types::{DepthImage, PointCloud3D};

    fn small_intrinsics() -> Intrinsics {
        Intrinsics::new(40.0, 40.0, 19.5, 19.5)
    }

    fn fused_wall_volume() -> TsdfVolume {
        let mut volume = TsdfVolume::new(32, 0.1);
        let mut cloud = PointCloud3D::new();
        cloud.points.push(Vector3::new(-0.4, -0.4, 0.5));
        cloud.points.push(Vector3::new(0.4, 0.4, 1.3));
        cloud.normals.push(Vector3::new(0.0, 0.0, -1.0));
        cloud.normals.push(Vector3::new(0.0, 0.0, -1.0));
        assert!(volume.calibrate(&cloud, 0.1));

        let depth = DepthImage::new(40, 40, vec![1.0; 1600]);
        let reconstructor =
            SurfaceReconstructor::new(small_intrinsics(), ReconstructorConfig::default());
        reconstructor.integrate(&mut volume, &depth, None, &Pose3D::identity());
        volume
    }

    #[test]
    fn test_clip_to_box() {
        let min = Vector3::new(0.0, 0.0, 0.0);
        let max = Vector3::new(1.0, 1.0, 1.0);

        let (t0, t1) = clip_to_box(
            &Vector3::new(0.5, 0.5, -1.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &min,
            &max,
        )
        .unwrap();
        assert_relative_eq!(t0, 1.0);
        assert_relative_eq!(t1, 2.0);

        // Parallel ray outside a slab misses
        assert!(clip_to_box(
            &Vector3::new(2.0, 0.5, -1.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &min,
            &max,
        )
        .is_none());

        // Box entirely behind the origin misses
        assert!(clip_to_box(
            &Vector3::new(0.5, 0.5, 2.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &min,
            &max,
        )
        .is_none());
    }

    #[test]
    fn test_predict_recovers_wall() {
        let volume = fused_wall_volume();
        let predictor = SurfacePredictor::new(small_intrinsics(), PredictorConfig::default());
        let frame = predictor.predict(&volume, 40, 40, &Pose3D::identity());

        let mut hits = 0;
        for py in 8..32 {
            for px in 8..32 {
                let idx = py * 40 + px;
                if !frame.points_valid[idx] {
                    continue;
                }
                hits += 1;
                let p = frame.points[idx];
                assert!(
                    (p.z - 1.0).abs() < 2.0 * volume.voxel_size(),
                    "predicted point off the wall: {p:?}"
                );
                if frame.normals_valid[idx] {
                    // Distance decreases toward the wall along +z
                    assert!(frame.normals[idx].z < -0.9);
                }
            }
        }
        assert!(hits > 100, "too few surface hits: {hits}");
    }

    #[test]
    fn test_predict_miss_stays_invalid() {
        let volume = fused_wall_volume();
        let predictor = SurfacePredictor::new(small_intrinsics(), PredictorConfig::default());
        // Camera looking away from the volume
        let away = Pose3D::from_parts(
            crate::core::math::rotation_from_angles(0.0, std::f32::consts::PI, 0.0),
            Vector3::zeros(),
        );
        let frame = predictor.predict(&volume, 40, 40, &away);
        assert!(frame.points_valid.iter().all(|v| !v));
        assert!(frame.normals_valid.iter().all(|v| !v));
    }

    #[test]
    fn test_predict_empty_volume() {
        let mut volume = TsdfVolume::new(16, 0.1);
        let mut cloud = PointCloud3D::new();
        cloud.points.push(Vector3::new(-0.5, -0.5, 0.5));
        cloud.points.push(Vector3::new(0.5, 0.5, 1.5));
        cloud.normals.push(Vector3::new(0.0, 0.0, -1.0));
        cloud.normals.push(Vector3::new(0.0, 0.0, -1.0));
        assert!(volume.calibrate(&cloud, 0.1));

        let predictor = SurfacePredictor::new(small_intrinsics(), PredictorConfig::default());
        let frame = predictor.predict(&volume, 20, 20, &Pose3D::identity());
        assert!(frame.points_valid.iter().all(|v| !v));
    }

    #[test]
    fn test_predict_color_of_fused_wall() {
        let mut volume = TsdfVolume::with_color(32, 0.1);
        let mut cloud = PointCloud3D::new();
        cloud.points.push(Vector3::new(-0.4, -0.4, 0.5));
        cloud.points.push(Vector3::new(0.4, 0.4, 1.3));
        cloud.normals.push(Vector3::new(0.0, 0.0, -1.0));
        cloud.normals.push(Vector3::new(0.0, 0.0, -1.0));
        assert!(volume.calibrate(&cloud, 0.1));

        let depth = DepthImage::new(40, 40, vec![1.0; 1600]);
        let mut color = crate::core::types::ColorImage::black(40, 40);
        for y in 0..40 {
            for x in 0..40 {
                color.set(x, y, [180, 60, 30]);
            }
        }
        let reconstructor =
            SurfaceReconstructor::new(small_intrinsics(), ReconstructorConfig::default());
        reconstructor.integrate(&mut volume, &depth, Some(&color), &Pose3D::identity());

        let predictor = SurfacePredictor::new(small_intrinsics(), PredictorConfig::default());
        let rendered = predictor.predict_color(&volume, 40, 40, &Pose3D::identity());
        let center = rendered.get(20, 20);
        assert!(center[0] > 150, "center pixel not wall-colored: {center:?}");
    }
}

//! Projective TSDF integration of depth (and color) frames.

use serde::{Deserialize, Serialize};

use crate::core::types::{ColorImage, DepthImage, Intrinsics, Pose3D};

use super::tsdf::TsdfVolume;

/// Tuning parameters for depth integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructorConfig {
    /// Truncation band half-width in meters. Signed distances are clamped
    /// to `+truncation`; observations more than `truncation` behind the
    /// surface are discarded as occluded.
    pub truncation: f32,
    /// Accumulation weight cap per voxel. Bounds the inertia of old
    /// observations so the model can still adapt to drift.
    pub max_weight: f32,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            truncation: 0.08,
            max_weight: 64.0,
        }
    }
}

/// Folds posed depth frames into a [`TsdfVolume`].
///
/// Per-voxel projective association: each voxel center is projected into
/// the depth frame and compared against the measurement at that pixel.
/// Voxels behind the surface by more than the truncation band are left
/// untouched, which keeps occluded space unobserved instead of carving it.
pub struct SurfaceReconstructor {
    intrinsics: Intrinsics,
    config: ReconstructorConfig,
}

impl SurfaceReconstructor {
    pub fn new(intrinsics: Intrinsics, config: ReconstructorConfig) -> Self {
        Self { intrinsics, config }
    }

    /// Integrate one depth frame captured at `camera_pose` (camera to
    /// world). Color, when supplied and the volume carries a color grid,
    /// is fused only for voxels inside the truncation band.
    pub fn integrate(
        &self,
        volume: &mut TsdfVolume,
        depth: &DepthImage,
        color: Option<&ColorImage>,
        camera_pose: &Pose3D,
    ) {
        let world_to_camera = camera_pose.inverse();
        let size = volume.size();

        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let center = volume.voxel_center(x, y, z);
                    let in_camera = world_to_camera.transform_point(&center);
                    let Some((px, py)) = self.intrinsics.project(&in_camera) else {
                        continue;
                    };
                    let px = px.round();
                    let py = py.round();
                    if px < 0.0
                        || py < 0.0
                        || px >= depth.width() as f32
                        || py >= depth.height() as f32
                    {
                        continue;
                    }
                    let (px, py) = (px as usize, py as usize);
                    let measured = depth.get(px, py);
                    if !DepthImage::is_valid(measured) {
                        continue;
                    }

                    // Positive in front of the surface, negative behind it.
                    let sdf = measured - in_camera.z;
                    if sdf < -self.config.truncation {
                        continue;
                    }
                    let clamped = sdf.min(self.config.truncation);

                    let w_old = volume.weight(x, y, z);
                    volume.update(x, y, z, clamped, 1.0, self.config.max_weight);

                    if sdf.abs() <= self.config.truncation {
                        if let Some(image) = color {
                            let [r, g, b] = image.get(px, py);
                            volume.fuse_color(x, y, z, [r as f32, g as f32, b as f32], w_old, 1.0);
                        }
                    }
                }
            }
        }
    }
}

//! Surface measurement: raw depth frame → validated point and normal maps.
//!
//! Two passes over the depth image:
//! 1. Back-projection: every pixel with a finite depth becomes a
//!    camera-space point; sentinel/NaN pixels are marked invalid.
//! 2. Normal estimation: central finite differences of depth along x and y,
//!    normal = normalize(du, dv, -1). Non-finite or too-large differences
//!    (depth discontinuities, occlusion edges) invalidate the normal, and
//!    the one-pixel image border is always normal-invalid.

use serde::{Deserialize, Serialize};

use crate::core::types::{DepthImage, GeometryFrame, Intrinsics};

/// Configuration for surface measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurerConfig {
    /// Apply an edge-preserving bilateral smoothing pass to the depth
    /// buffer before geometry extraction.
    pub smooth_depth: bool,

    /// Bilateral filter window radius in pixels.
    pub smooth_radius: usize,

    /// Bilateral spatial sigma (pixels).
    pub sigma_spatial: f32,

    /// Bilateral range sigma (meters of depth difference).
    pub sigma_range: f32,

    /// Maximum accepted half finite-difference of depth (meters).
    ///
    /// Larger steps indicate a surface discontinuity; the normal there is
    /// marked invalid.
    pub max_depth_step: f32,
}

impl Default for MeasurerConfig {
    fn default() -> Self {
        Self {
            smooth_depth: false,
            smooth_radius: 2,
            sigma_spatial: 2.5,
            sigma_range: 0.1,
            max_depth_step: 0.05,
        }
    }
}

/// Builds a [`GeometryFrame`] from a raw depth frame.
#[derive(Debug, Clone)]
pub struct SurfaceMeasurer {
    intrinsics: Intrinsics,
    width: usize,
    height: usize,
    config: MeasurerConfig,
}

impl SurfaceMeasurer {
    /// Create a measurer for a fixed image geometry.
    pub fn new(intrinsics: Intrinsics, width: usize, height: usize, config: MeasurerConfig) -> Self {
        Self {
            intrinsics,
            width,
            height,
            config,
        }
    }

    /// Measure a depth frame into a point + normal map.
    ///
    /// The depth image dimensions must match the measurer's; a mismatch is
    /// a caller contract breach and aborts.
    pub fn measure(&self, depth: &DepthImage) -> GeometryFrame {
        assert_eq!(depth.width(), self.width, "depth image width mismatch");
        assert_eq!(depth.height(), self.height, "depth image height mismatch");

        let smoothed;
        let depth = if self.config.smooth_depth {
            smoothed = self.bilateral_filter(depth);
            &smoothed
        } else {
            depth
        };

        let mut frame = GeometryFrame::invalid(self.width, self.height);
        self.backproject(depth, &mut frame);
        self.estimate_normals(depth, &mut frame);
        frame
    }

    fn backproject(&self, depth: &DepthImage, frame: &mut GeometryFrame) {
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let d = depth.data()[idx];
                if DepthImage::is_valid(d) {
                    frame.points[idx] = self.intrinsics.backproject(x as f32, y as f32, d);
                    frame.points_valid[idx] = true;
                }
            }
        }
    }

    fn estimate_normals(&self, depth: &DepthImage, frame: &mut GeometryFrame) {
        let data = depth.data();
        let w = self.width;
        for y in 1..self.height.saturating_sub(1) {
            for x in 1..w.saturating_sub(1) {
                let idx = y * w + x;
                let du = 0.5 * (data[idx + 1] - data[idx - 1]);
                let dv = 0.5 * (data[idx + w] - data[idx - w]);
                if !du.is_finite()
                    || !dv.is_finite()
                    || du.abs() > self.config.max_depth_step
                    || dv.abs() > self.config.max_depth_step
                {
                    continue;
                }
                let normal = nalgebra::Vector3::new(du, dv, -1.0).normalize();
                frame.normals[idx] = normal;
                frame.normals_valid[idx] = true;
            }
        }
        // Border rows/columns stay invalid: no neighbor to difference against.
    }

    /// Edge-preserving bilateral smoothing of the depth buffer.
    ///
    /// Invalid pixels neither contribute to nor receive smoothed values.
    fn bilateral_filter(&self, depth: &DepthImage) -> DepthImage {
        let r = self.config.smooth_radius as isize;
        let inv_2ss = 1.0 / (2.0 * self.config.sigma_spatial * self.config.sigma_spatial);
        let inv_2sr = 1.0 / (2.0 * self.config.sigma_range * self.config.sigma_range);

        let mut out = DepthImage::filled_invalid(self.width, self.height);
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let center = depth.get(x as usize, y as usize);
                if !DepthImage::is_valid(center) {
                    continue;
                }
                let mut sum = 0.0f32;
                let mut weight_sum = 0.0f32;
                for dy in -r..=r {
                    for dx in -r..=r {
                        let nx = x + dx;
                        let ny = y + dy;
                        if nx < 0
                            || ny < 0
                            || nx >= self.width as isize
                            || ny >= self.height as isize
                        {
                            continue;
                        }
                        let sample = depth.get(nx as usize, ny as usize);
                        if !DepthImage::is_valid(sample) {
                            continue;
                        }
                        let spatial_sq = (dx * dx + dy * dy) as f32;
                        let range = sample - center;
                        let weight =
                            (-spatial_sq * inv_2ss - range * range * inv_2sr).exp();
                        sum += weight * sample;
                        weight_sum += weight;
                    }
                }
                if weight_sum > 0.0 {
                    out.set(x as usize, y as usize, sum / weight_sum);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DEPTH_SENTINEL;
    use approx::assert_relative_eq;

    fn test_intrinsics() -> Intrinsics {
        Intrinsics::new(100.0, 100.0, 15.5, 11.5)
    }

    fn flat_depth(width: usize, height: usize, d: f32) -> DepthImage {
        DepthImage::new(width, height, vec![d; width * height])
    }

    #[test]
    fn test_flat_plane_interior_all_valid() {
        let measurer = SurfaceMeasurer::new(test_intrinsics(), 32, 24, MeasurerConfig::default());
        let frame = measurer.measure(&flat_depth(32, 24, 2.0));

        for y in 1..23 {
            for x in 1..31 {
                let idx = y * 32 + x;
                assert!(frame.points_valid[idx]);
                assert!(frame.normals_valid[idx]);
                // Flat plane facing the camera: normal is (0, 0, -1)
                assert_relative_eq!(frame.normals[idx].z, -1.0, epsilon = 1e-6);
                assert_relative_eq!(frame.points[idx].z, 2.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_border_normals_invalid() {
        let measurer = SurfaceMeasurer::new(test_intrinsics(), 32, 24, MeasurerConfig::default());
        let frame = measurer.measure(&flat_depth(32, 24, 2.0));

        for x in 0..32 {
            assert!(!frame.normals_valid[x]);
            assert!(!frame.normals_valid[23 * 32 + x]);
        }
        for y in 0..24 {
            assert!(!frame.normals_valid[y * 32]);
            assert!(!frame.normals_valid[y * 32 + 31]);
        }
    }

    #[test]
    fn test_sentinel_pixel_invalid_point_and_neighbors_lose_normals() {
        let mut depth = flat_depth(32, 24, 2.0);
        depth.set(10, 10, DEPTH_SENTINEL);

        let measurer = SurfaceMeasurer::new(test_intrinsics(), 32, 24, MeasurerConfig::default());
        let frame = measurer.measure(&depth);

        assert!(!frame.points_valid[10 * 32 + 10]);
        // Horizontal/vertical neighbors difference across the sentinel
        assert!(!frame.normals_valid[10 * 32 + 9]);
        assert!(!frame.normals_valid[10 * 32 + 11]);
        assert!(!frame.normals_valid[9 * 32 + 10]);
        assert!(!frame.normals_valid[11 * 32 + 10]);
    }

    #[test]
    fn test_depth_discontinuity_invalidates_normal() {
        let mut depth = flat_depth(32, 24, 2.0);
        // A 1 m jump, far above the 0.05 m step threshold
        for y in 0..24 {
            for x in 16..32 {
                depth.set(x, y, 3.0);
            }
        }
        let measurer = SurfaceMeasurer::new(test_intrinsics(), 32, 24, MeasurerConfig::default());
        let frame = measurer.measure(&depth);

        // Pixels straddling the jump have too-large du
        assert!(!frame.normals_valid[12 * 32 + 15]);
        assert!(!frame.normals_valid[12 * 32 + 16]);
        // Away from the jump normals are fine
        assert!(frame.normals_valid[12 * 32 + 5]);
        assert!(frame.normals_valid[12 * 32 + 25]);
    }

    #[test]
    fn test_valid_pixels_have_finite_points() {
        let mut depth = flat_depth(16, 16, 1.0);
        depth.set(3, 3, f32::NAN);
        let measurer = SurfaceMeasurer::new(test_intrinsics(), 16, 16, MeasurerConfig::default());
        let frame = measurer.measure(&depth);

        for i in 0..frame.len() {
            if frame.points_valid[i] {
                assert!(frame.points[i].iter().all(|c| c.is_finite()));
            }
        }
    }

    #[test]
    fn test_bilateral_smoothing_preserves_flat_plane() {
        let config = MeasurerConfig {
            smooth_depth: true,
            ..Default::default()
        };
        let measurer = SurfaceMeasurer::new(test_intrinsics(), 16, 16, config);
        let frame = measurer.measure(&flat_depth(16, 16, 1.5));
        let idx = 8 * 16 + 8;
        assert!(frame.points_valid[idx]);
        assert_relative_eq!(frame.points[idx].z, 1.5, epsilon = 1e-4);
    }

    #[test]
    #[should_panic]
    fn test_dimension_mismatch_panics() {
        let measurer = SurfaceMeasurer::new(test_intrinsics(), 32, 24, MeasurerConfig::default());
        let _ = measurer.measure(&flat_depth(16, 16, 1.0));
    }
}

//! Truncated signed-distance volume.
//!
//! A cubic voxel grid holding a running weighted estimate of the signed
//! distance to the nearest surface: positive outside (free space), negative
//! inside, magnitude clamped to a truncation band by the integrator.
//! Optionally stores a fused RGB triple per voxel.

use nalgebra::Vector3;

use crate::core::types::PointCloud3D;

/// Fixed-size signed-distance voxel grid.
///
/// Allocated once per session; `calibrate` positions it over the observed
/// scene from the first frame and is never repeated. Voxel coordinates
/// outside `[0, size)` are precondition violations and abort.
#[derive(Debug, Clone)]
pub struct TsdfVolume {
    size: usize,
    voxel_size: f32,
    origin: Vector3<f32>,
    distances: Vec<f32>,
    weights: Vec<f32>,
    colors: Option<Vec<[f32; 3]>>,
}

impl TsdfVolume {
    /// Allocate a `size³` volume. `size` must be even and non-zero.
    pub fn new(size: usize, voxel_size: f32) -> Self {
        assert!(size > 0 && size % 2 == 0, "volume size must be even");
        assert!(voxel_size > 0.0, "voxel size must be positive");
        let n = size * size * size;
        Self {
            size,
            voxel_size,
            origin: Vector3::zeros(),
            distances: vec![0.0; n],
            weights: vec![0.0; n],
            colors: None,
        }
    }

    /// Allocate a volume that also fuses per-voxel color.
    pub fn with_color(size: usize, voxel_size: f32) -> Self {
        let mut volume = Self::new(size, voxel_size);
        volume.colors = Some(vec![[0.0; 3]; size * size * size]);
        volume
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    #[inline]
    pub fn origin(&self) -> Vector3<f32> {
        self.origin
    }

    /// Whether this volume fuses color.
    pub fn has_color(&self) -> bool {
        self.colors.is_some()
    }

    /// World-space extent of one side of the volume cube.
    pub fn extent(&self) -> f32 {
        self.size as f32 * self.voxel_size
    }

    /// Position and scale the volume to bracket a point cloud.
    ///
    /// Sets the origin to the cloud's minimum corner minus `margin` and the
    /// voxel edge so the largest axis extent (plus margins) spans the grid.
    /// Returns `false` for an empty cloud, which cannot calibrate anything.
    pub fn calibrate(&mut self, cloud: &PointCloud3D, margin: f32) -> bool {
        let Some((min, max)) = cloud.bounding_box() else {
            return false;
        };
        let extent = (max - min).add_scalar(2.0 * margin);
        let largest = extent.x.max(extent.y).max(extent.z);
        if largest <= 0.0 || !largest.is_finite() {
            return false;
        }
        self.origin = min.map(|c| c - margin);
        self.voxel_size = largest / self.size as f32;
        true
    }

    /// Flatten voxel coordinates: `x + y·size + z·size²`.
    #[inline]
    pub fn ravel(&self, x: usize, y: usize, z: usize) -> usize {
        assert!(x < self.size, "voxel x out of range");
        assert!(y < self.size, "voxel y out of range");
        assert!(z < self.size, "voxel z out of range");
        x + y * self.size + z * self.size * self.size
    }

    /// Invert [`TsdfVolume::ravel`].
    #[inline]
    pub fn unravel(&self, idx: usize) -> (usize, usize, usize) {
        assert!(idx < self.size * self.size * self.size, "voxel index out of range");
        let x = idx % self.size;
        let y = (idx / self.size) % self.size;
        let z = idx / (self.size * self.size);
        (x, y, z)
    }

    /// World-space center of a voxel.
    #[inline]
    pub fn voxel_center(&self, x: usize, y: usize, z: usize) -> Vector3<f32> {
        self.origin
            + Vector3::new(
                (x as f32 + 0.5) * self.voxel_size,
                (y as f32 + 0.5) * self.voxel_size,
                (z as f32 + 0.5) * self.voxel_size,
            )
    }

    /// Voxel containing a world point, `None` outside the grid.
    pub fn world_to_voxel(&self, point: &Vector3<f32>) -> Option<(usize, usize, usize)> {
        let rel = (point - self.origin) / self.voxel_size;
        let x = rel.x.floor();
        let y = rel.y.floor();
        let z = rel.z.floor();
        let max = self.size as f32;
        if x < 0.0 || y < 0.0 || z < 0.0 || x >= max || y >= max || z >= max {
            return None;
        }
        Some((x as usize, y as usize, z as usize))
    }

    #[inline]
    pub fn distance(&self, x: usize, y: usize, z: usize) -> f32 {
        self.distances[self.ravel(x, y, z)]
    }

    #[inline]
    pub fn weight(&self, x: usize, y: usize, z: usize) -> f32 {
        self.weights[self.ravel(x, y, z)]
    }

    pub fn color(&self, x: usize, y: usize, z: usize) -> Option<[f32; 3]> {
        let idx = self.ravel(x, y, z);
        self.colors.as_ref().map(|c| c[idx])
    }

    /// Fold a new distance observation into the running weighted average:
    /// `sdf' = (w·sdf + w_new·d) / (w + w_new)`, `w' = min(w + w_new, w_max)`.
    pub fn update(&mut self, x: usize, y: usize, z: usize, dist: f32, w_new: f32, w_max: f32) {
        let idx = self.ravel(x, y, z);
        let w = self.weights[idx];
        self.distances[idx] = (w * self.distances[idx] + w_new * dist) / (w + w_new);
        self.weights[idx] = (w + w_new).min(w_max);
    }

    /// Fold a color observation in with the same averaging rule.
    ///
    /// `w_old` is the voxel's accumulation weight before the matching
    /// distance update. No-op on colorless volumes.
    pub fn fuse_color(&mut self, x: usize, y: usize, z: usize, rgb: [f32; 3], w_old: f32, w_new: f32) {
        let idx = self.ravel(x, y, z);
        if let Some(colors) = self.colors.as_mut() {
            let c = &mut colors[idx];
            for ch in 0..3 {
                c[ch] = (w_old * c[ch] + w_new * rgb[ch]) / (w_old + w_new);
            }
        }
    }

    /// Signed distance at a world point, `None` outside the grid or at an
    /// unobserved voxel.
    pub fn sample_distance(&self, point: &Vector3<f32>) -> Option<f32> {
        let (x, y, z) = self.world_to_voxel(point)?;
        let idx = self.ravel(x, y, z);
        (self.weights[idx] > 0.0).then(|| self.distances[idx])
    }

    /// Central-difference gradient of the distance field at a voxel.
    ///
    /// Requires all six axis neighbors to be in bounds and observed.
    pub fn gradient(&self, x: usize, y: usize, z: usize) -> Option<Vector3<f32>> {
        if x == 0 || y == 0 || z == 0 || x + 1 >= self.size || y + 1 >= self.size || z + 1 >= self.size
        {
            return None;
        }
        let observed = |x: usize, y: usize, z: usize| self.weight(x, y, z) > 0.0;
        if !observed(x + 1, y, z)
            || !observed(x - 1, y, z)
            || !observed(x, y + 1, z)
            || !observed(x, y - 1, z)
            || !observed(x, y, z + 1)
            || !observed(x, y, z - 1)
        {
            return None;
        }
        let scale = 0.5 / self.voxel_size;
        Some(Vector3::new(
            (self.distance(x + 1, y, z) - self.distance(x - 1, y, z)) * scale,
            (self.distance(x, y + 1, z) - self.distance(x, y - 1, z)) * scale,
            (self.distance(x, y, z + 1) - self.distance(x, y, z - 1)) * scale,
        ))
    }

    /// Thresholded surface extraction for offline inspection.
    ///
    /// Returns voxel centers whose distance lies within `dist_threshold` of
    /// zero and whose weight is at least `weight_threshold`, with normals
    /// from the local distance gradient. Not part of the per-frame hot
    /// path.
    pub fn extract_points(&self, dist_threshold: f32, weight_threshold: f32) -> PointCloud3D {
        let mut cloud = PointCloud3D::new();
        for idx in 0..self.distances.len() {
            if self.weights[idx] < weight_threshold || self.distances[idx].abs() > dist_threshold {
                continue;
            }
            let (x, y, z) = self.unravel(idx);
            let Some(gradient) = self.gradient(x, y, z) else {
                continue;
            };
            let norm = gradient.norm();
            if norm <= f32::EPSILON {
                continue;
            }
            cloud.points.push(self.voxel_center(x, y, z));
            cloud.normals.push(gradient / norm);
        }
        cloud
    }
}

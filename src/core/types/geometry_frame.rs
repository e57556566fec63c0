//! Per-frame point and normal maps with validity flags.

use nalgebra::Vector3;

use super::Pose3D;

/// Image-shaped point + normal map produced from one depth frame.
///
/// All four arrays have the same length (`width * height`, row-major).
/// Point and normal validity are independent: a pixel can have a valid
/// point but an invalid normal (e.g. at a depth discontinuity), so
/// consumers must combine both flags. [`GeometryFrame::prune`] does exactly
/// that.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryFrame {
    pub width: usize,
    pub height: usize,
    pub points: Vec<Vector3<f32>>,
    pub points_valid: Vec<bool>,
    pub normals: Vec<Vector3<f32>>,
    pub normals_valid: Vec<bool>,
}

impl GeometryFrame {
    /// An all-invalid frame of the given dimensions.
    pub fn invalid(width: usize, height: usize) -> Self {
        let n = width * height;
        Self {
            width,
            height,
            points: vec![Vector3::zeros(); n],
            points_valid: vec![false; n],
            normals: vec![Vector3::zeros(); n],
            normals_valid: vec![false; n],
        }
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keep only elements where both point and normal are valid.
    ///
    /// Collapses the image-shaped maps into a dense cloud; the original
    /// pixel index is lost, so pruning is one-way.
    pub fn prune(&self) -> PointCloud3D {
        assert_eq!(self.points.len(), self.points_valid.len());
        assert_eq!(self.normals.len(), self.normals_valid.len());
        assert_eq!(self.points.len(), self.normals.len());

        let mut points = Vec::new();
        let mut normals = Vec::new();
        for i in 0..self.points.len() {
            if self.points_valid[i] && self.normals_valid[i] {
                points.push(self.points[i]);
                normals.push(self.normals[i]);
            }
        }
        PointCloud3D { points, normals }
    }
}

/// Dense (validity-free) point cloud with per-point unit normals.
///
/// Produced by pruning a [`GeometryFrame`]; every element is valid by
/// construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud3D {
    pub points: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl PointCloud3D {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Take every `stride`-th element.
    ///
    /// This is an array-stride downsample, not a geometric resampling: it
    /// bounds registration cost while keeping the scan's coverage roughly
    /// uniform in image order.
    pub fn stride(&self, stride: usize) -> PointCloud3D {
        assert!(stride > 0, "stride must be positive");
        if stride == 1 {
            return self.clone();
        }
        let n = self.points.len().min(self.normals.len()) / stride;
        let mut points = Vec::with_capacity(n);
        let mut normals = Vec::with_capacity(n);
        for i in 0..n {
            points.push(self.points[i * stride]);
            normals.push(self.normals[i * stride]);
        }
        PointCloud3D { points, normals }
    }

    /// Transform every point and normal by a pose.
    pub fn transformed(&self, pose: &Pose3D) -> PointCloud3D {
        PointCloud3D {
            points: self
                .points
                .iter()
                .map(|p| pose.transform_point(p))
                .collect(),
            normals: self
                .normals
                .iter()
                .map(|n| pose.transform_normal(n))
                .collect(),
        }
    }

    /// Axis-aligned bounding box, `None` for an empty cloud.
    pub fn bounding_box(&self) -> Option<(Vector3<f32>, Vector3<f32>)> {
        let first = *self.points.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some((min, max))
    }
}

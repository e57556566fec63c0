//! Nearest-neighbor ICP with a linearized point-to-plane solve.
//!
//! # Algorithm
//!
//! ```text
//! Input: source cloud S, target cloud T (with normals), initial guess P₀
//! Output: pose P aligning S into T's frame
//!
//! 1. Build a k-d tree over T's points
//! 2. For a fixed number of iterations:
//!    a. Transform S by the current estimate P
//!    b. Match each transformed point to its nearest neighbor in T,
//!       rejecting matches beyond the distance gate
//!    c. Assemble the 4N×6 least-squares system: one linearized
//!       point-to-plane row per match plus three point-to-point rows
//!    d. Solve via SVD for (α, β, γ, tx, ty, tz), assemble the delta
//!       pose, and left-multiply: P ← ΔP · P
//! 3. Return P after the final iteration (no early convergence exit)
//! ```
//!
//! The mixed point-to-plane + point-to-point system over-constrains each
//! correspondence relative to canonical point-to-plane ICP; that formulation
//! is kept deliberately.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};

use super::PoseEstimator;
use crate::core::math::rotation_from_angles;
use crate::core::types::{PointCloud3D, Pose3D};

/// Configuration for nearest-neighbor ICP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Number of refinement iterations. Always run to completion; there is
    /// no residual-based early exit.
    pub iterations: u32,

    /// Maximum correspondence distance (meters). Nearest neighbors beyond
    /// this are treated as "no acceptable match".
    pub max_correspondence_distance: f32,

    /// Minimum number of matches needed for a well-posed solve. Below
    /// this the 6-DoF system is under-determined and refinement stops.
    pub min_correspondences: usize,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            max_correspondence_distance: 0.3,
            min_correspondences: 6,
        }
    }
}

/// ICP pose estimator backed by a k-d tree nearest-neighbor index.
#[derive(Debug, Clone)]
pub struct NearestNeighborIcp {
    config: IcpConfig,
}

impl NearestNeighborIcp {
    /// Create an estimator with the given configuration.
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Build a k-d tree over a cloud's points.
    fn build_kdtree(cloud: &PointCloud3D) -> KdTree<f32, 3> {
        let mut tree: KdTree<f32, 3> = KdTree::new();
        for (i, point) in cloud.points.iter().enumerate() {
            tree.add(&[point.x, point.y, point.z], i as u64);
        }
        tree
    }

    /// One iteration's accepted matches as (source, target, target normal).
    fn find_correspondences(
        &self,
        transformed: &[Vector3<f32>],
        target: &PointCloud3D,
        target_tree: &KdTree<f32, 3>,
    ) -> Vec<(Vector3<f32>, Vector3<f32>, Vector3<f32>)> {
        let max_dist_sq = self.config.max_correspondence_distance.powi(2);
        let mut pairs = Vec::with_capacity(transformed.len());

        for s in transformed {
            let nearest = target_tree.nearest_one::<SquaredEuclidean>(&[s.x, s.y, s.z]);
            if nearest.distance <= max_dist_sq {
                let idx = nearest.item as usize;
                // TODO: prune correspondences whose normals disagree with
                // the target normal before accepting them.
                pairs.push((*s, target.points[idx], target.normals[idx]));
            }
        }
        pairs
    }
}

impl PoseEstimator for NearestNeighborIcp {
    fn estimate_pose(
        &self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        initial_guess: &Pose3D,
    ) -> Pose3D {
        if source.is_empty() || target.is_empty() {
            log::warn!(
                "icp: empty cloud (source {}, target {}), returning initial guess",
                source.len(),
                target.len()
            );
            return *initial_guess;
        }

        let target_tree = Self::build_kdtree(target);
        let mut estimate = *initial_guess;

        for iteration in 0..self.config.iterations {
            let transformed: Vec<Vector3<f32>> = source
                .points
                .iter()
                .map(|p| estimate.transform_point(p))
                .collect();

            let pairs = self.find_correspondences(&transformed, target, &target_tree);
            if pairs.len() < self.config.min_correspondences {
                log::warn!(
                    "icp: {} correspondences at iteration {} (need {}), stopping refinement",
                    pairs.len(),
                    iteration,
                    self.config.min_correspondences
                );
                break;
            }

            let Some(delta) = solve_point_to_plane(&pairs) else {
                log::warn!("icp: degenerate least-squares system at iteration {iteration}");
                break;
            };
            estimate = delta.compose(&estimate);
        }

        estimate
    }
}

/// Solve the mixed point-to-plane / point-to-point system for an
/// incremental pose.
///
/// Each matched pair (s, d, n) contributes four rows:
/// - plane row: `(s×n | n) · x = n·(d − s)`
/// - three point rows constraining direct coordinate agreement.
///
/// The 6-vector `x = (α, β, γ, tx, ty, tz)` is recovered by SVD and the
/// delta rotation composed as Rx(α)·Ry(β)·Rz(γ).
fn solve_point_to_plane(
    pairs: &[(Vector3<f32>, Vector3<f32>, Vector3<f32>)],
) -> Option<Pose3D> {
    let n_points = pairs.len();
    let mut a = DMatrix::<f32>::zeros(4 * n_points, 6);
    let mut b = DVector::<f32>::zeros(4 * n_points);

    for (i, (s, d, n)) in pairs.iter().enumerate() {
        // Point-to-plane constraint
        b[i] = n.dot(d) - n.dot(s);
        a[(i, 0)] = n.z * s.y - n.y * s.z;
        a[(i, 1)] = n.x * s.z - n.z * s.x;
        a[(i, 2)] = n.y * s.x - n.x * s.y;
        a[(i, 3)] = n.x;
        a[(i, 4)] = n.y;
        a[(i, 5)] = n.z;

        // Point-to-point constraints, one row per coordinate
        let row = n_points + i;
        b[row] = d.x - s.x;
        a[(row, 1)] = s.z;
        a[(row, 2)] = -s.y;
        a[(row, 3)] = 1.0;

        let row = 2 * n_points + i;
        b[row] = d.y - s.y;
        a[(row, 0)] = -s.z;
        a[(row, 2)] = s.x;
        a[(row, 4)] = 1.0;

        let row = 3 * n_points + i;
        b[row] = d.z - s.z;
        a[(row, 0)] = s.y;
        a[(row, 1)] = -s.x;
        a[(row, 5)] = 1.0;
    }

    let svd = a.svd(true, true);
    let x = svd.solve(&b, 1e-6).ok()?;

    let rotation = rotation_from_angles(x[0], x[1], x[2]);
    let translation = Vector3::new(x[3], x[4], x[5]);
    Some(Pose3D::from_parts(rotation, translation))
}
